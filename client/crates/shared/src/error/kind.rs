//! Error Kind - Classification of errors
//!
//! Defines the [`ErrorKind`] enum: the short category shown next to every
//! failure message at the clock.

use serde::Serialize;

/// エラー種別の列挙体
///
/// 打刻操作の失敗をユーザー向けのカテゴリに分類します。
/// 各バリアントは短い表示名と、再試行可能かどうかの情報を持ちます。
///
/// ## Notes
/// * `non_exhaustive` - 将来的に列挙子が追加される可能性があることを示す
///
/// ## Examples
/// ```rust
/// use kernel::error::kind::ErrorKind;
///
/// let kind = ErrorKind::Geofence;
/// assert_eq!(kind.as_str(), "Outside Work Location");
/// assert!(!kind.is_retryable());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorKind {
    /// 位置情報を取得できない（未対応・タイムアウト・権限拒否）
    Location,
    /// ジオフェンスの範囲外、または勤務地が未選択
    Geofence,
    /// 生体認証の失敗（未対応・キャンセル・検証失敗）
    Biometric,
    /// 勤怠状態と競合（二重出勤・二重退勤など）
    Conflict,
    /// 別の打刻処理が進行中
    Busy,
    /// 通信エラー、またはバックエンドの一時的な障害
    Network,
    /// セッションが無効（未ログイン・ログアウト済み・権限なし）
    Session,
    /// 入力値が不正
    Validation,
    /// 内部エラー
    Internal,
}

impl ErrorKind {
    /// ユーザー向けの文字列表現を取得
    ///
    /// ## Returns
    /// 画面に表示する短いカテゴリ名
    ///
    /// ## Examples
    /// ```rust
    /// use kernel::error::kind::ErrorKind;
    /// assert_eq!(ErrorKind::Busy.as_str(), "Please Wait");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Location => "Location Unavailable",
            ErrorKind::Geofence => "Outside Work Location",
            ErrorKind::Biometric => "Biometric Check Failed",
            ErrorKind::Conflict => "Attendance Conflict",
            ErrorKind::Busy => "Please Wait",
            ErrorKind::Network => "Connection Problem",
            ErrorKind::Session => "Session Expired",
            ErrorKind::Validation => "Invalid Input",
            ErrorKind::Internal => "Unexpected Error",
        }
    }

    /// 同じ操作を再試行して成功する可能性があるかどうか
    ///
    /// 位置情報・生体認証・通信の失敗、および処理中による拒否は
    /// `true` を返します。状態の競合や入力エラーは再試行しても変わりません。
    #[inline]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Location | ErrorKind::Biometric | ErrorKind::Busy | ErrorKind::Network
        )
    }

    /// ログに記録すべきエラーかどうかを判定
    ///
    /// 通信エラーと内部エラーは `true` を返します。
    #[inline]
    pub const fn is_operational(&self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Internal)
    }

    /// バックエンドの HTTP ステータスコードから分類を決定
    ///
    /// ## Examples
    /// ```rust
    /// use kernel::error::kind::ErrorKind;
    /// assert_eq!(ErrorKind::from_status(409), ErrorKind::Conflict);
    /// assert_eq!(ErrorKind::from_status(503), ErrorKind::Network);
    /// ```
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorKind::Session,
            409 => ErrorKind::Conflict,
            408 | 429 => ErrorKind::Network,
            400..=499 => ErrorKind::Validation,
            500..=599 => ErrorKind::Network,
            _ => ErrorKind::Internal,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert_eq!(ErrorKind::from_status(400), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Session);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::Session);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(408), ErrorKind::Network);
        assert_eq!(ErrorKind::from_status(409), ErrorKind::Conflict);
        assert_eq!(ErrorKind::from_status(422), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::Network);
        assert_eq!(ErrorKind::from_status(500), ErrorKind::Network);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::Network);
        assert_eq!(ErrorKind::from_status(302), ErrorKind::Internal);
    }

    #[test]
    fn test_is_retryable() {
        assert!(ErrorKind::Location.is_retryable());
        assert!(ErrorKind::Biometric.is_retryable());
        assert!(ErrorKind::Busy.is_retryable());
        assert!(ErrorKind::Network.is_retryable());
        assert!(!ErrorKind::Geofence.is_retryable());
        assert!(!ErrorKind::Conflict.is_retryable());
        assert!(!ErrorKind::Session.is_retryable());
    }

    #[test]
    fn test_is_operational() {
        assert!(ErrorKind::Network.is_operational());
        assert!(ErrorKind::Internal.is_operational());
        assert!(!ErrorKind::Geofence.is_operational());
    }

    #[test]
    fn test_serialize_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::Geofence).unwrap();
        assert_eq!(json, r#""GEOFENCE""#);
    }
}
