pub mod op_helper;
pub mod record_op;
pub mod console_op;
pub mod probe_op;
pub mod check_op;
