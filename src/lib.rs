//! Persistent Mapped Heap.
//!
//! `pmheap`は、一つのファイルを固定の仮想アドレスにマッピングし、その上にヒープを構築するライブラリ.
//! ヒープから割り当てた領域は、プロセスの再起動後も同じアドレスに復元されるので、
//! シリアライズ層を挟まずにポインタベースの永続データ構造を扱うことができる.
//!
//! # 特徴
//!
//! - 割当はbump-pointer方式で、常に使用済み領域の末尾に配置される
//!   - 各ブロックの直前にはメタデータ(使用中フラグ、サイズ)が埋め込まれる
//!   - 解放はフラグを落とすだけであり、解放済み領域が再利用されることはない
//! - 領域の先頭には二ワード分のヘッダ(シグネチャ、使用済みバイト数)が置かれ、
//!   オープン時にはこれを読んで「既存ヒープの継続」か「空ヒープへの初期化」かを決定する
//! - ヒープの容量はオープン時のファイルサイズで固定され、ファイルが拡張されることはない
//! - 同一ファイルに対する複数ハンドルの同時利用はサポートしない
//!
//! # モジュールの依存関係
//!
//! ```text
//! heap => region
//! ```
//!
//! - [heap]モジュール:
//!   - 主に[Heap]構造体と[HeapBuilder]を提供
//!   - `pmheap`の利用者が直接触るのはこれら
//! - [region]モジュール:
//!   - 主に[Region]トレイトとその実装である[MappedFile]を提供
//!   - [heap]に対して固定アドレスのバイト列を提供するのが目的
//!
//! # バイナリフォーマット
//!
//! ワードは`usize`で、ネイティブエンディアン.
//!
//! ```text
//! offset 0:             signature (word) -- 1なら初期化済み
//! offset WORD_SIZE:     utilized  (word) -- ブロック群が消費したバイト数
//! offset 2 * WORD_SIZE: heap base
//!   block: [active(word)][size(word)][payload(size bytes)]
//!   block: [active(word)][size(word)][payload(size bytes)]
//!   ...
//! ```
//!
//! [heap]: ./heap/index.html
//! [Heap]: ./heap/struct.Heap.html
//! [HeapBuilder]: ./heap/struct.HeapBuilder.html
//! [region]: ./region/index.html
//! [Region]: ./region/trait.Region.html
//! [MappedFile]: ./region/struct.MappedFile.html
#![warn(missing_docs)]
extern crate byteorder;
extern crate libc;
extern crate prometrics;
#[macro_use]
extern crate slog;
#[cfg(test)]
extern crate tempdir;
#[macro_use]
extern crate trackable;

pub use crate::error::{Error, ErrorKind};

macro_rules! track_io {
    ($expr:expr) => {
        $expr.map_err(|e: ::std::io::Error| track!(crate::Error::from(e)))
    };
}

pub mod heap;
pub mod metrics;
pub mod region;

mod error;

/// crate固有の`Result`型.
pub type Result<T> = std::result::Result<T, Error>;
