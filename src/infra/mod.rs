pub mod abort_signal;
