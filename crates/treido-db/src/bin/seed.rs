//! # Seed Data Generator
//!
//! Populates the database with a demo catalog for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./treido_dev.db with 20 products per leaf category (default)
//! cargo run -p treido-db --bin seed
//!
//! # Custom amount / path
//! cargo run -p treido-db --bin seed -- --per-category 50 --db ./data/market.db
//! ```
//!
//! ## Generated Data
//! - Three sellers (`woodshop`, `techhub`, `bookworm`)
//! - A two-level category tree with Bulgarian names
//! - Category attributes (one global, the rest per branch)
//! - Products spread across the leaf categories, some without inventory tracking

use chrono::{Duration, Utc};
use std::env;
use treido_core::category::{normalize_attribute_key, AttributeType};
use treido_core::{CategoryAttribute, CategoryLite, Product, Profile};
use treido_db::repository::generate_id;
use treido_db::{Database, DbConfig};

const SELLERS: &[(&str, &str)] = &[
    ("woodshop", "Wood Shop"),
    ("techhub", "Tech Hub"),
    ("bookworm", "Bookworm"),
];

/// (slug, name, name_bg, children as (slug, name, name_bg))
type CategorySeed = (&'static str, &'static str, &'static str, &'static [(&'static str, &'static str, &'static str)]);

const CATEGORIES: &[CategorySeed] = &[
    (
        "electronics",
        "Electronics",
        "Електроника",
        &[
            ("smartphones", "Smartphones", "Смартфони"),
            ("laptops", "Laptops", "Лаптопи"),
            ("headphones", "Headphones", "Слушалки"),
        ],
    ),
    (
        "home",
        "Home & Garden",
        "Дом и градина",
        &[
            ("furniture", "Furniture", "Мебели"),
            ("kitchen", "Kitchen", "Кухня"),
        ],
    ),
    (
        "books",
        "Books",
        "Книги",
        &[
            ("fiction", "Fiction", "Художествена литература"),
            ("science", "Science", "Наука"),
        ],
    ),
];

/// (category slug or None for global, name, name_bg, type, options)
const ATTRIBUTES: &[(Option<&str>, &str, &str, AttributeType, &[&str])] = &[
    (None, "Condition", "Състояние", AttributeType::Select, &["new", "used"]),
    (Some("electronics"), "Brand", "Марка", AttributeType::Select, &["acme", "globex", "initech"]),
    (Some("smartphones"), "Storage", "Памет", AttributeType::Select, &["64gb", "128gb", "256gb"]),
    (Some("home"), "Material", "Материал", AttributeType::Select, &["oak", "pine", "steel"]),
    (Some("books"), "Language", "Език", AttributeType::Select, &["en", "bg"]),
];

const ADJECTIVES: &[&str] = &["Classic", "Compact", "Deluxe", "Vintage", "Modern", "Handmade"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut per_category: usize = 20;
    let mut db_path = String::from("./treido_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--per-category" | "-n" => {
                if i + 1 < args.len() {
                    per_category = args[i + 1].parse().unwrap_or(20);
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
                println!("Treido Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --per-category <N>  Products per leaf category (default: 20)");
                println!("  -d, --db <PATH>         Database file path (default: ./treido_dev.db)");
                println!("  -h, --help              Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Treido Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!("Products per category: {}", per_category);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Sellers
    let mut seller_ids = Vec::new();
    for (username, display_name) in SELLERS {
        let id = generate_id();
        db.profiles()
            .insert(&Profile {
                id: id.clone(),
                username: Some(username.to_string()),
                display_name: Some(display_name.to_string()),
            })
            .await?;
        seller_ids.push(id);
    }
    println!("✓ {} sellers", seller_ids.len());

    // Categories
    let mut slug_to_id = std::collections::HashMap::new();
    let mut leaves = Vec::new();
    for (order, (slug, name, name_bg, children)) in CATEGORIES.iter().enumerate() {
        let root_id = generate_id();
        db.categories()
            .insert(&category(&root_id, slug, name, name_bg, None), order as i64)
            .await?;
        slug_to_id.insert(*slug, root_id.clone());

        for (child_order, (child_slug, child_name, child_name_bg)) in children.iter().enumerate() {
            let child_id = generate_id();
            db.categories()
                .insert(
                    &category(&child_id, child_slug, child_name, child_name_bg, Some(&root_id)),
                    child_order as i64,
                )
                .await?;
            slug_to_id.insert(*child_slug, child_id.clone());
            leaves.push((*child_slug, child_id));
        }
    }
    println!("✓ {} categories", slug_to_id.len());

    // Attributes
    for (sort_order, (owner, name, name_bg, attribute_type, options)) in ATTRIBUTES.iter().enumerate() {
        let category_id = owner.and_then(|slug| slug_to_id.get(slug).cloned());
        db.categories()
            .insert_attribute(&CategoryAttribute {
                id: generate_id(),
                category_id,
                name: name.to_string(),
                name_bg: Some(name_bg.to_string()),
                attribute_type: *attribute_type,
                attribute_key: normalize_attribute_key(name),
                options: Some(options.iter().map(|o| o.to_string()).collect()),
                options_bg: None,
                is_filterable: true,
                is_required: false,
                sort_order: sort_order as i64,
            })
            .await?;
    }
    println!("✓ {} attributes", ATTRIBUTES.len());

    // Products
    let start = std::time::Instant::now();
    let mut generated = 0usize;
    for (leaf_idx, (leaf_slug, leaf_id)) in leaves.iter().enumerate() {
        for n in 0..per_category {
            let seed = leaf_idx * 1000 + n;
            let product = generate_product(leaf_slug, leaf_id, &seller_ids[seed % seller_ids.len()], seed);

            if let Err(e) = db.products().insert(&product).await {
                eprintln!("Failed to insert {}: {}", product.title, e);
                continue;
            }
            let condition = if seed % 3 == 0 { "used" } else { "new" };
            db.products().set_attribute(&product.id, "condition", condition).await?;

            generated += 1;
        }
    }

    let elapsed = start.elapsed();
    println!("✓ Generated {} products in {:?}", generated, elapsed);

    let newest = db.products().search("", 1, 5).await?;
    println!("  Newest feed: {} products, has_more = {}", newest.products.len(), newest.has_more);

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}

fn category(id: &str, slug: &str, name: &str, name_bg: &str, parent_id: Option<&str>) -> CategoryLite {
    CategoryLite {
        id: id.to_string(),
        name: name.to_string(),
        name_bg: Some(name_bg.to_string()),
        slug: slug.to_string(),
        parent_id: parent_id.map(str::to_string),
        icon: None,
        image_url: None,
    }
}

/// Generates a single product with deterministic pseudo-random data.
fn generate_product(leaf_slug: &str, category_id: &str, seller_id: &str, seed: usize) -> Product {
    let adjective = ADJECTIVES[seed % ADJECTIVES.len()];
    let title = format!("{} {} #{}", adjective, leaf_slug.trim_end_matches('s'), seed);
    let slug = title
        .to_lowercase()
        .replace('#', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");

    // 4.99 .. 504.99
    let price_cents = 499 + ((seed * 7919) % 50_000) as i64;

    Product {
        id: generate_id(),
        seller_id: seller_id.to_string(),
        category_id: Some(category_id.to_string()),
        title,
        slug: Some(slug.clone()),
        price_cents,
        images: vec![format!("https://picsum.photos/seed/{}/600/600", slug)],
        // Every 7th listing is a one-off without stock tracking
        track_inventory: seed % 7 != 0,
        stock: (seed % 25) as i64,
        is_active: true,
        created_at: Utc::now() - Duration::minutes(seed as i64),
    }
}
