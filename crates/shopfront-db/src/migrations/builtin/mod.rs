//! Units compiled into the binary. Add new units to [`units`]; order does not
//! matter because the registry sorts by identifier.

mod m20240101000001_create_categories_table;
mod m20240101000002_create_products_table;
mod m20240101000003_create_users_table;
mod m20240101000004_create_orders_tables;
mod m20240101000005_create_sessions_table;
mod m20240215093000_add_product_search_indexes;

use super::Migration;

pub use m20240101000001_create_categories_table::CreateCategoriesTable;
pub use m20240101000002_create_products_table::CreateProductsTable;
pub use m20240101000003_create_users_table::CreateUsersTable;
pub use m20240101000004_create_orders_tables::CreateOrdersTables;
pub use m20240101000005_create_sessions_table::CreateSessionsTable;
pub use m20240215093000_add_product_search_indexes::AddProductSearchIndexes;

pub fn units() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(CreateCategoriesTable),
        Box::new(CreateProductsTable),
        Box::new(CreateUsersTable),
        Box::new(CreateOrdersTables),
        Box::new(CreateSessionsTable),
        Box::new(AddProductSearchIndexes),
    ]
}
