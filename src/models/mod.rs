pub mod newsletter;
pub mod order;
pub mod product;
pub mod user;

pub use newsletter::NewsletterSubscriber;
pub use order::{Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress};
pub use product::{Category, Product, ProductDetails, Review, Variant};
pub use user::{Address, Role, User};
