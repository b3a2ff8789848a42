//! End-to-end scenario tests driving the full engine against an in-process
//! executor network.

mod cases;
