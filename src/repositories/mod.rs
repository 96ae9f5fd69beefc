pub mod newsletter;
pub mod order;
pub mod product;
pub mod user;

pub use newsletter::NewsletterRepository;
pub use order::{NewOrder, OrderRepository};
pub use product::{ProductDraft, ProductRepository};
pub use user::{ProfileChanges, UserRepository};
