//! Maps driver errors onto the shared [`StoreError`] taxonomy.

use warband_core::StoreError;

/// Classify a `sqlx` error as transient (connection/driver trouble, safe to
/// retry the surrounding operation) or fatal (a constraint violation, which
/// implies the data model itself is in a state the invariants forbid).
///
/// Ground: spec §7 draws this exact line between `store/transient` and
/// `store/fatal`; `sqlx::Error::Database` carrying a constraint-violation
/// code is the only variant that can mean the latter, everything else
/// (pool timeout, connection reset, protocol error, row decode failure) is
/// transient.
pub fn map_sqlx_error(err: sqlx::Error, context: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_check_violation() || db_err.is_foreign_key_violation() => {
            StoreError::Fatal {
                reason: format!("{context}: constraint violation: {err}"),
            }
        }
        _ => StoreError::Transient {
            reason: format!("{context}: {err}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_is_transient() {
        let err = map_sqlx_error(sqlx::Error::RowNotFound, "find_active_by_principal");
        assert!(matches!(err, StoreError::Transient { .. }));
    }

    #[test]
    fn pool_timeout_is_transient() {
        let err = map_sqlx_error(sqlx::Error::PoolTimedOut, "get_day");
        assert!(matches!(err, StoreError::Transient { .. }));
    }
}
