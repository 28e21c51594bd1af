//! 工具函数模块

pub mod dashmap;

pub use dashmap::*;
