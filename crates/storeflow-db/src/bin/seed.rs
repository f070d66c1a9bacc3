//! # Seed Data Generator
//!
//! Populates the database with demo data for development.
//!
//! ## Usage
//! ```bash
//! # Generate 500 products (default)
//! cargo run -p storeflow-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p storeflow-db --bin seed -- --count 2000
//!
//! # Specify database path
//! cargo run -p storeflow-db --bin seed -- --db ./data/storeflow.db
//! ```
//!
//! ## Generated Data
//! - The default tenant, two warehouses (Main, Backroom)
//! - Categories with products: unique SKU `{CATEGORY}-{INDEX}`, realistic
//!   names, price $0.99-$19.99, cost 60-80% of price
//! - Opening stock for every product via a stock adjustment, so the
//!   movement history starts with a proper audit trail
//! - A 10% storewide discount and a buy-2-get-1 on beverages
//! - One cash register

use chrono::Utc;
use std::env;
use storeflow_core::{DiscountScope, DiscountType, Product, DEFAULT_TENANT_ID};
use storeflow_db::repository::discount::DiscountInput;
use storeflow_db::repository::ledger::{NewAdjustment, NewAdjustmentItem};
use storeflow_db::{Database, DbConfig};
use uuid::Uuid;

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "BEV",
        &[
            "Coca-Cola 330ml",
            "Pepsi 330ml",
            "Sprite 330ml",
            "Red Bull 250ml",
            "Orange Juice 1L",
            "Apple Juice 1L",
            "Still Water 500ml",
            "Sparkling Water 500ml",
            "Iced Tea 500ml",
            "Cold Brew Coffee",
        ],
    ),
    (
        "SNK",
        &[
            "Salted Crisps 150g",
            "Tortilla Chips 200g",
            "Chocolate Wafer Bar",
            "Dark Chocolate 85%",
            "Sour Worms 160g",
            "Sandwich Cookies",
            "Salted Pretzels 250g",
            "Trail Mix 300g",
            "Granola Bar",
            "Rice Cakes",
        ],
    ),
    (
        "DAI",
        &[
            "Whole Milk 1L",
            "Oat Milk 1L",
            "Cheddar Block 200g",
            "Greek Yogurt 500g",
            "Salted Butter 250g",
            "Free Range Eggs 12pk",
            "Cream Cheese 150g",
            "Sour Cream 200g",
            "Mozzarella 125g",
            "Parmesan Wedge 100g",
        ],
    ),
    (
        "PAN",
        &[
            "Sourdough Loaf",
            "Multigrain Loaf",
            "Spaghetti 500g",
            "Penne 500g",
            "Basmati Rice 1kg",
            "Baked Beans 400g",
            "Chopped Tomatoes 400g",
            "Peanut Butter 340g",
            "Raw Honey 250g",
            "Rolled Oats 1kg",
        ],
    ),
];

const SEED_USER: &str = "seed";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 500;
    let mut db_path = String::from("./storeflow_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(500);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("storeflow seed - demo data generator");
                println!();
                println!("Usage: seed [--count N] [--db PATH]");
                println!();
                println!("  -c, --count <N>    products to generate (default 500)");
                println!("  -d, --db <PATH>    database file (default ./storeflow_dev.db)");
                println!("  -h, --help         this message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Storeflow Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count(DEFAULT_TENANT_ID).await?;
    if existing > 0 {
        println!("⚠ {} products already present, nothing to do.", existing);
        println!("  Remove the database file to reseed from scratch.");
        return Ok(());
    }

    // Tenant + locations
    sqlx::query("INSERT OR IGNORE INTO tenants (id, name, created_at) VALUES (?1, ?2, ?3)")
        .bind(DEFAULT_TENANT_ID)
        .bind("Demo Store")
        .bind(Utc::now())
        .execute(db.pool())
        .await?;

    let main = db
        .products()
        .create_warehouse(DEFAULT_TENANT_ID, "Main")
        .await?;
    db.products()
        .create_warehouse(DEFAULT_TENANT_ID, "Backroom")
        .await?;
    println!("✓ Created warehouses");

    // Generate products and opening stock
    println!();
    println!("Generating products...");

    let mut generated = 0;
    let mut beverage_ids = Vec::new();
    let mut stock_lines = Vec::new();
    let start = std::time::Instant::now();

    let mut categories = Vec::new();
    for (category_code, _) in CATEGORIES {
        let category = db
            .products()
            .create_category(DEFAULT_TENANT_ID, category_code)
            .await?;
        categories.push(category);
    }

    'outer: for round in 0.. {
        for ((category_code, names), category) in CATEGORIES.iter().zip(&categories) {
            for (idx, name) in names.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = round * names.len() + idx;
                let product = generate_product(category_code, &category.id, name, seed);
                let product_id = product.id.clone();

                if let Err(e) = db.products().insert(&product).await {
                    eprintln!("Failed to insert {}: {}", product.sku, e);
                    continue;
                }

                if *category_code == "BEV" {
                    beverage_ids.push(product_id.clone());
                }

                // Opening stock 10-109 units
                stock_lines.push(NewAdjustmentItem {
                    product_id,
                    quantity: (10 + seed % 100) as i64,
                    subtract: false,
                    reason: Some("opening stock".to_string()),
                });

                generated += 1;
                if generated % 200 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }

    db.ledger()
        .process_adjustment(NewAdjustment {
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            warehouse_id: main.id.clone(),
            user_id: SEED_USER.to_string(),
            reference: "SEED-OPENING".to_string(),
            notes: Some("seed opening stock".to_string()),
            items: stock_lines,
        })
        .await?;

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products in {:?}", generated, elapsed);

    // Discounts
    db.discounts()
        .create(DiscountInput {
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            name: "Storewide 10%".to_string(),
            discount_type: DiscountType::Percentage,
            value: 1000,
            applies_to: DiscountScope::All,
            start_date: None,
            end_date: None,
            min_purchase_qty: None,
            min_purchase_amount_cents: Some(500),
            max_discount_amount_cents: Some(2000),
            buy_qty: None,
            get_qty: None,
            active: true,
            product_ids: vec![],
            category_ids: vec![],
        })
        .await?;

    db.discounts()
        .create(DiscountInput {
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            name: "Beverages buy 2 get 1".to_string(),
            discount_type: DiscountType::BuyXGetY,
            value: 0,
            applies_to: DiscountScope::Products,
            start_date: None,
            end_date: None,
            min_purchase_qty: None,
            min_purchase_amount_cents: None,
            max_discount_amount_cents: None,
            buy_qty: Some(2),
            get_qty: Some(1),
            active: true,
            product_ids: beverage_ids,
            category_ids: vec![],
        })
        .await?;
    println!("✓ Created discounts");

    db.cash_registers()
        .create_register(DEFAULT_TENANT_ID, "Front Counter")
        .await?;
    println!("✓ Created cash register");

    let value = db.ledger().stock_value(&main.id).await?;
    println!();
    println!("  Main warehouse stock value: {}", value);
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single product with realistic data.
fn generate_product(category: &str, category_id: &str, name: &str, seed: usize) -> Product {
    let now = Utc::now();

    let sku = format!("{}-{:04}", category, seed);

    // Price $0.99 - $19.99
    let price_cents = 99 + ((seed * 37) % 1900) as i64;

    // Cost 60-80% of price
    let cost_pct = 60 + (seed % 20) as i64;
    let cost_cents = price_cents * cost_pct / 100;

    let full_name = if seed < CATEGORIES.len() * 10 {
        name.to_string()
    } else {
        format!("{} #{}", name, seed)
    };

    Product {
        id: Uuid::new_v4().to_string(),
        tenant_id: DEFAULT_TENANT_ID.to_string(),
        sku,
        name: full_name,
        category_id: Some(category_id.to_string()),
        cost_cents,
        price_cents,
        track_inventory: true,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
