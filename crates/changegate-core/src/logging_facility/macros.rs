//! Boundary logging macros
//!
//! Every boundary event carries `component` (the calling module), `op` and
//! `event`. Extra `key = value` fields pass straight through to `tracing`.

#[doc(hidden)]
#[macro_export]
macro_rules! __log_boundary {
    ($level:ident, $op:expr, $event:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = module_path!(),
            op = $op,
            event = $event,
            $($($field)*)?
        )
    };
}

/// Log the start of an operation
///
/// ```
/// # use changegate_core::log_op_start;
/// log_op_start!("write_apply");
/// log_op_start!("write_apply", branch = "wi/Proj/01");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)*)?) => {
        $crate::__log_boundary!(
            info,
            $op,
            changegate_core_types::schema::EVENT_START
            $(, $($field)*)?
        )
    };
}

/// Log the successful end of an operation
///
/// ```
/// # use changegate_core::log_op_end;
/// log_op_end!("write_apply", duration_ms = 12);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {
        $crate::__log_boundary!(
            info,
            $op,
            changegate_core_types::schema::EVENT_END,
            duration_ms = $duration
            $(, $($field)*)?
        )
    };
}

/// Log an operation failure with the error's code and kind
///
/// ```
/// # use changegate_core::{log_op_error, errors::ExError};
/// let err = ExError::stale_head("a1", "b2");
/// log_op_error!("sync", err, duration_ms = 3);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        $crate::__log_boundary!(
            error,
            $op,
            changegate_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            err_message = ex_err.message()
            $(, $($field)*)?
        )
    }};
}
