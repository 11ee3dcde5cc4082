// crates/so_grid/src/lib.rs

//! StochOil Grid Layer
//!
//! 带一圈虚拟边界单元的二维结构化网格。
//!
//! # 模块概览
//!
//! - [`cell`]: 单元类型、几何与模板
//! - [`structured`]: 网格生成器与拓扑查询
//!
//! # 编号约定
//!
//! 单元按列主序编号：`id = (num_y + 2) * i + j`，其中 `i` 为 x 方向索引，
//! `j` 为 y 方向索引，二者都包含边界环。内部单元模板顺序为
//! `[self, y-, y+, x-, x+]`。
//!
//! ```
//! use so_grid::StructuredGrid;
//!
//! let grid = StructuredGrid::new(5, 5, 1.0, 1.0, 0.01).unwrap();
//! assert_eq!(grid.len(), 49);
//! assert_eq!(grid.interior_id(2, 2), 7 * 3 + 3);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cell;
pub mod structured;

pub use cell::{Axis, Cell, CellType, Point};
pub use structured::StructuredGrid;
