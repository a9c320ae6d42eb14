use prometrics::metrics::MetricBuilder;
use slog::{Discard, Logger};
use std::path::Path;

use super::header::{RegionHeader, HEADER_SIZE};
use super::Heap;
use crate::metrics::HeapMetrics;
use crate::region::{MappedFile, MappedFileBuilder, Region, DEFAULT_BASE_ADDRESS};
use crate::{ErrorKind, Result};

/// `Heap`のビルダ.
#[derive(Debug, Clone)]
pub struct HeapBuilder {
    truncate: bool,
    base_address: usize,
    logger: Logger,
    metrics: MetricBuilder,
}
impl HeapBuilder {
    /// 新しい`HeapBuilder`インスタンスを生成する.
    pub fn new() -> Self {
        HeapBuilder {
            truncate: false,
            base_address: DEFAULT_BASE_ADDRESS,
            logger: Logger::root(Discard, o!()),
            metrics: MetricBuilder::new(),
        }
    }

    /// オープン時に既存のヒープを破棄して、空のヒープとして初期化し直すかどうかを設定する.
    ///
    /// `false`の場合でも、領域のシグネチャが初期化済みを示していなければ初期化が行われる.
    ///
    /// デフォルト値は`false`.
    pub fn truncate(&mut self, truncate: bool) -> &mut Self {
        self.truncate = truncate;
        self
    }

    /// バッキングファイルをマッピングする仮想アドレスを設定する.
    ///
    /// ヒープ内のポインタを再オープン後も有効にするためには、毎回同じ値を指定する必要がある.
    ///
    /// デフォルト値は`DEFAULT_BASE_ADDRESS`.
    pub fn base_address(&mut self, address: usize) -> &mut Self {
        self.base_address = address;
        self
    }

    /// ヒープ用の logger を登録する.
    pub fn logger(&mut self, logger: Logger) -> &mut Self {
        self.logger = logger;
        self
    }

    /// メトリクス用の共通設定を登録する.
    ///
    /// デフォルト値は`MetricBuilder::new()`.
    pub fn metrics(&mut self, metrics: MetricBuilder) -> &mut Self {
        self.metrics = metrics;
        self
    }

    /// `filepath`のファイルをバッキングストアとしてヒープを開く.
    ///
    /// ファイルは事前に作成されている必要があり、そのサイズがヒープの容量となる.
    ///
    /// # Errors
    ///
    /// [`MappedFileBuilder::open`]が返すエラーに加えて、
    /// ファイルサイズがヘッダサイズ未満の場合には、種類が`ErrorKind::InvalidArgument`のエラーが返される.
    ///
    /// 失敗時には、途中で確保したリソース(ファイルディスクリプタやマッピング)は全て解放される.
    ///
    /// [`MappedFileBuilder::open`]: ../region/struct.MappedFileBuilder.html#method.open
    pub fn open<P: AsRef<Path>>(&self, filepath: P) -> Result<Heap<MappedFile>> {
        let region = track!(MappedFileBuilder::new()
            .base_address(self.base_address)
            .open(filepath))?;
        info!(
            self.logger,
            "Backing file is mapped";
            "path" => format!("{:?}", region.path()),
            "capacity" => region.capacity(),
            "base_address" => format!("{:#x}", self.base_address)
        );
        track!(self.open_region(region))
    }

    /// 任意の領域をバッキングストアとしてヒープを開く.
    ///
    /// 領域のヘッダを読み込み、シグネチャが初期化済みを示していれば、
    /// 永続化されている使用済みバイト数を引き継いで既存のヒープを再開する.
    /// そうでない場合(あるいは`truncate`が指定されている場合)には、空のヒープとして初期化する.
    pub fn open_region<R: Region>(&self, mut region: R) -> Result<Heap<R>> {
        let capacity = region.capacity();
        track_assert!(
            capacity >= HEADER_SIZE,
            ErrorKind::InvalidArgument,
            "Too small capacity: {}",
            capacity
        );

        let saved_header = track!(RegionHeader::read_from(&region))?;
        let header = if self.truncate || !saved_header.is_initialized() {
            let header = RegionHeader::new();
            track!(header.write_to(&mut region))?;
            info!(
                self.logger,
                "Heap is initialized";
                "truncate" => self.truncate,
                "saved_signature" => saved_header.signature,
                "capacity" => capacity
            );
            header
        } else {
            info!(
                self.logger,
                "Heap is recovered";
                "utilized" => saved_header.utilized,
                "capacity" => capacity
            );
            saved_header
        };

        let metrics = HeapMetrics::new(&self.metrics, capacity);
        metrics.utilized_bytes.set(header.utilized as f64);
        Ok(Heap::new(
            region,
            header.utilized,
            self.logger.clone(),
            metrics,
        ))
    }
}
impl Default for HeapBuilder {
    fn default() -> Self {
        Self::new()
    }
}
