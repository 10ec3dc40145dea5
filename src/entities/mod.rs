//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod chain;
pub mod file;
pub mod message;
pub mod order;
pub mod setting;
pub mod user;
pub mod user_role;

// Re-export specific types to avoid conflicts
pub use chain::{Column as ChainColumn, Entity as Chain, Model as ChainModel};
pub use file::{Column as FileColumn, Entity as File, MediaKind, Model as FileModel};
pub use message::{Column as MessageColumn, Entity as Message, MessageKind, Model as MessageModel};
pub use order::{Column as OrderColumn, Currency, Entity as Order, Model as OrderModel, OrderState};
pub use setting::{Column as SettingColumn, Entity as Setting, Model as SettingModel};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
pub use user_role::{Column as UserRoleColumn, Entity as UserRole, Model as UserRoleModel, Role};
