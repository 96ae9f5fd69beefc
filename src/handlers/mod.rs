pub mod auth;
pub mod contact;
pub mod extract;
pub mod health;
pub mod newsletter;
pub mod orders;
pub mod password_reset;
pub mod products;

pub use auth::{favorites, login, me, register, update_profile};
pub use contact::{contact_health, send_contact_message};
pub use health::{api_banner, health_check};
pub use newsletter::{subscribe, subscribers, unsubscribe};
pub use orders::{create_order, get_order, list_orders, my_orders, update_order_status};
pub use password_reset::{forgot_password, reset_password};
pub use products::{
    create_product, delete_product, featured_products, get_product, list_all_products,
    list_products, products_by_category, promotions, review_product, search_products,
    toggle_favorite, update_product,
};
