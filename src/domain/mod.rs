pub mod board;
pub mod card;
pub mod ids;
pub mod ordered;
pub mod placement;

pub use board::{Board, Column};
pub use card::Card;
pub use ids::{BoardId, CardId, ColumnId};
pub use ordered::{Ordered, OrderedCollection};
pub use placement::{CardUpdate, ColumnUpdate, Placement};
