mod cancellation;
mod determinism;
mod executor_faults;
mod no_cross;
mod round_status;
mod simple_match;
mod solvency_rejection;
mod volume_asymmetry;
