use trackable::error::ErrorKindExt;

/// crate固有のエラー型.
#[derive(Debug, Clone, TrackableError)]
pub struct Error(trackable::error::TrackableError<ErrorKind>);
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if let Some(e) = e.get_ref().and_then(|e| e.downcast_ref::<Error>()).cloned() {
            return e;
        }
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound.cause(e).into(),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied.cause(e).into(),
            std::io::ErrorKind::InvalidInput => ErrorKind::InvalidArgument.cause(e).into(),
            _ => ErrorKind::Other.cause(e).into(),
        }
    }
}
impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        let kind = match *e.kind() {
            ErrorKind::NotFound => std::io::ErrorKind::NotFound,
            ErrorKind::PermissionDenied => std::io::ErrorKind::PermissionDenied,
            ErrorKind::InvalidArgument => std::io::ErrorKind::InvalidInput,
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, e)
    }
}

/// 発生し得るエラーの種別.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 指定されたファイルが存在しない.
    NotFound,

    /// ファイルを読み書き可能モードで開く権限がない.
    PermissionDenied,

    /// 指定されたパスが通常のファイルではない (e.g., ディレクトリやデバイスファイル).
    NotRegularFile,

    /// 指定アドレスへのマッピングにOSが失敗した.
    ///
    /// # 典型的な対応策
    ///
    /// - 既に同じアドレス範囲を使用しているヒープを閉じる
    /// - 別のベースアドレスを指定する
    MapFailed,

    /// ヒープに空き容量がない.
    ///
    /// 解放済みのブロックは再利用されないので、この状態から回復することはできない.
    ///
    /// # 典型的な対応策
    ///
    /// - より大きなファイルを用意した上で、初期化し直す
    OutOfSpace,

    /// 入力が不正.
    ///
    /// # 典型的な対応策
    ///
    /// - 利用者側のプログラムを修正して入力を正しくする
    InvalidArgument,

    /// その他エラー.
    ///
    /// E.g., I/Oエラー
    Other,
}
impl trackable::error::ErrorKind for ErrorKind {}
