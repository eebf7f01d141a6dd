//! Optimization problems built on the IR.

pub mod pose_refine;
