//! [Prometheus][prometheus]用のメトリクス.
//!
//! [prometheus]: https://prometheus.io/
use prometrics::metrics::{Counter, Gauge, MetricBuilder};

/// ヒープのメトリクス.
#[derive(Debug, Clone)]
pub struct HeapMetrics {
    pub(crate) capacity_bytes: Gauge,
    pub(crate) utilized_bytes: Gauge,
    pub(crate) allocated_blocks: Counter,
    pub(crate) allocated_bytes: Counter,
    pub(crate) released_blocks: Counter,
    pub(crate) failed_allocations: Counter,
    pub(crate) syncs: Counter,
    pub(crate) sync_failures: Counter,
}
impl HeapMetrics {
    /// ヒープの容量(バッキングファイルのサイズ).
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// pmheap_heap_capacity_bytes <GAUGE>
    /// ```
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes.value() as u64
    }

    /// ブロック群(メタデータ込み)が消費したバイト数.
    ///
    /// 解放済みのブロックも含まれるので、この値が減ることはない.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// pmheap_heap_utilized_bytes <GAUGE>
    /// ```
    pub fn utilized_bytes(&self) -> u64 {
        self.utilized_bytes.value() as u64
    }

    /// このセッション中に割り当てられたブロックの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// pmheap_heap_allocated_blocks_total <COUNTER>
    /// ```
    pub fn allocated_blocks(&self) -> u64 {
        self.allocated_blocks.value() as u64
    }

    /// このセッション中に割り当てられたバイト数(ペイロードのみ).
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// pmheap_heap_allocated_bytes_total <COUNTER>
    /// ```
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes.value() as u64
    }

    /// このセッション中に解放されたブロックの数.
    ///
    /// 未知のポインタが指定されて何も行われなかった呼び出しは含まない.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// pmheap_heap_released_blocks_total <COUNTER>
    /// ```
    pub fn released_blocks(&self) -> u64 {
        self.released_blocks.value() as u64
    }

    /// 空き容量不足で失敗した割当の数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// pmheap_heap_failed_allocations_total <COUNTER>
    /// ```
    pub fn failed_allocations(&self) -> u64 {
        self.failed_allocations.value() as u64
    }

    /// バッキングストアに対して発行された同期命令の数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// pmheap_heap_syncs_total <COUNTER>
    /// ```
    pub fn syncs(&self) -> u64 {
        self.syncs.value() as u64
    }

    /// 失敗した同期命令の数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// pmheap_heap_sync_failures_total <COUNTER>
    /// ```
    pub fn sync_failures(&self) -> u64 {
        self.sync_failures.value() as u64
    }

    pub(crate) fn new(builder: &MetricBuilder, capacity: usize) -> Self {
        let mut builder = builder.clone();
        builder.namespace("pmheap").subsystem("heap");
        HeapMetrics {
            capacity_bytes: builder
                .gauge("capacity_bytes")
                .help("Size of the backing store")
                .initial_value(capacity as f64)
                .finish()
                .expect("Never fails"),
            utilized_bytes: builder
                .gauge("utilized_bytes")
                .help("Number of bytes consumed by blocks, including freed ones")
                .finish()
                .expect("Never fails"),
            allocated_blocks: builder
                .counter("allocated_blocks_total")
                .help("Number of allocated blocks")
                .finish()
                .expect("Never fails"),
            allocated_bytes: builder
                .counter("allocated_bytes_total")
                .help("Number of payload bytes allocated")
                .finish()
                .expect("Never fails"),
            released_blocks: builder
                .counter("released_blocks_total")
                .help("Number of blocks marked as inactive")
                .finish()
                .expect("Never fails"),
            failed_allocations: builder
                .counter("failed_allocations_total")
                .help("Number of allocations refused for lack of space")
                .finish()
                .expect("Never fails"),
            syncs: builder
                .counter("syncs_total")
                .help("Number of synchronization instructions issued to the backing store")
                .finish()
                .expect("Never fails"),
            sync_failures: builder
                .counter("sync_failures_total")
                .help("Number of failed synchronization instructions")
                .finish()
                .expect("Never fails"),
        }
    }
}
