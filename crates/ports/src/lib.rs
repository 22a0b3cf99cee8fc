//! ports - 抽象 trait 层
//!
//! 定义启动流程依赖的外部协作者接口

mod database;
mod model;

pub use database::*;
pub use model::*;
