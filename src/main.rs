use std::fs;
use std::io::{self, Write};

use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mystic_market::account::{JwtAuth, PublicProfile, Registration};
use mystic_market::catalog::ItemId;
use mystic_market::config::Args;
use mystic_market::data::{default_catalog, load_catalog};
use mystic_market::payment::{Settlement, SimulatedPayments};
use mystic_market::progression::{CatalogListing, JourneyRecord};
use mystic_market::store::{CartItemId, CartLine, MemoryStore, Order, SqliteStore, StoreRepository};
use mystic_market::Storefront;

const COMMANDS: &str = "Commands: catalog | item <id> | register <email> <username> <password> <name...> | login <email> <password> | logout | me | cart | add <item_id> | remove <cart_id> | pay | pending | settle <reference> <ok|fail> | confirm <reference> | orders | journey | health | quit";

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("mystic_market={},info", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let store: Box<dyn StoreRepository> = if args.in_memory {
        Box::new(MemoryStore::new())
    } else {
        if let Some(parent) = args.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        Box::new(
            SqliteStore::open(&args.db_path)
                .with_context(|| format!("opening {}", args.db_path.display()))?,
        )
    };

    let auth = match &args.jwt_secret {
        Some(secret) => JwtAuth::new(secret.clone(), args.token_ttl_seconds())?,
        None => JwtAuth::new_dev(),
    };
    let settlement = if args.manual_settlement {
        Settlement::Manual
    } else {
        Settlement::Immediate
    };
    let mut shop = Storefront::new(store, Box::new(auth), SimulatedPayments::new(settlement));

    let catalog = match &args.catalog {
        Some(path) => load_catalog(path)?,
        None => default_catalog()?,
    };
    shop.seed_catalog(&catalog.items)?;

    println!("Mystic Market console");
    print_health(&shop);
    println!("{}", COMMANDS);

    let mut session: Option<String> = None;
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let cmd = parts.next().unwrap_or("").to_lowercase();

        match cmd.as_str() {
            "quit" | "exit" => break,
            "help" => println!("{}", COMMANDS),
            "health" => print_health(&shop),
            "catalog" => match shop.catalog(session.as_deref()) {
                Ok(listings) => print_catalog(&listings),
                Err(err) => println!("Catalog unavailable: {}", err),
            },
            "item" => match parts.next().map(str::parse::<i64>) {
                Some(Ok(id)) => match shop.item(ItemId(id)) {
                    Ok(item) => {
                        println!(
                            "#{} {} by {} ({}) {}",
                            item.id,
                            item.title,
                            item.artist,
                            item.category,
                            format_price(item.price)
                        );
                        if let (Some(gate), Some(title)) = (item.gate, item.gate_title.as_ref()) {
                            println!("  gate {}: {}", gate, title);
                        }
                        println!("  {}", item.description);
                        if let Some(context) = &item.philosophical_context {
                            println!("  {}", context);
                        }
                        println!(
                            "  tags: {} | likes {} | views {}",
                            item.tags.join(", "),
                            item.likes,
                            item.views
                        );
                    }
                    Err(err) => println!("{}", err),
                },
                _ => println!("Usage: item <id>"),
            },
            "register" => {
                let fields: Vec<&str> = parts.collect();
                if fields.len() < 4 {
                    println!("Usage: register <email> <username> <password> <name...>");
                    continue;
                }
                let registration = Registration {
                    email: fields[0].to_string(),
                    username: fields[1].to_string(),
                    password: fields[2].to_string(),
                    name: fields[3..].join(" "),
                };
                match shop.register(registration) {
                    Ok(new_session) => {
                        println!("Welcome, {}.", new_session.user.name);
                        print_profile(&new_session.user);
                        session = Some(new_session.access_token);
                    }
                    Err(err) => println!("Registration failed: {}", err),
                }
            }
            "login" => match (parts.next(), parts.next()) {
                (Some(email), Some(password)) => match shop.login(email, password) {
                    Ok(new_session) => {
                        print_profile(&new_session.user);
                        session = Some(new_session.access_token);
                    }
                    Err(err) => println!("Login failed: {}", err),
                },
                _ => println!("Usage: login <email> <password>"),
            },
            "logout" => {
                session = None;
                println!("Logged out.");
            }
            "me" => {
                let Some(token) = require_session(&session) else {
                    continue;
                };
                match shop.profile(token) {
                    Ok(profile) => print_profile(&profile),
                    Err(err) => println!("{}", err),
                }
            }
            "cart" => {
                let Some(token) = require_session(&session) else {
                    continue;
                };
                match shop.cart(token) {
                    Ok(lines) => print_cart(&lines),
                    Err(err) => println!("{}", err),
                }
            }
            "add" => {
                let Some(token) = require_session(&session) else {
                    continue;
                };
                match parts.next().map(str::parse::<i64>) {
                    Some(Ok(id)) => match shop.add_to_cart(token, ItemId(id)) {
                        Ok(line) => println!(
                            "Added {} to cart (line {})",
                            line.item.title, line.cart_id.0
                        ),
                        Err(err) => println!("Cannot add: {}", err),
                    },
                    _ => println!("Usage: add <item_id>"),
                }
            }
            "remove" => {
                let Some(token) = require_session(&session) else {
                    continue;
                };
                match parts.next().map(str::parse::<i64>) {
                    Some(Ok(id)) => match shop.remove_from_cart(token, CartItemId(id)) {
                        Ok(_) => println!("Item removed from cart"),
                        Err(err) => println!("{}", err),
                    },
                    _ => println!("Usage: remove <cart_id>"),
                }
            }
            "pay" => {
                let Some(token) = require_session(&session) else {
                    continue;
                };
                match shop.create_payment(token) {
                    Ok(intent) => println!(
                        "Payment {} for {} {} created; confirm with: confirm {}",
                        intent.reference,
                        format_price(intent.amount),
                        intent.currency,
                        intent.reference
                    ),
                    Err(err) => println!("Payment processing failed: {}", err),
                }
            }
            "pending" => {
                let pending = shop.payments().pending();
                if pending.is_empty() {
                    println!("No pending payments.");
                }
                for reference in pending {
                    println!("  {}", reference);
                }
            }
            "settle" => match (parts.next(), parts.next()) {
                (Some(reference), Some(outcome @ ("ok" | "fail"))) => {
                    match shop.payments_mut().settle(reference, outcome == "ok") {
                        Ok(()) => println!("Payment {} settled ({})", reference, outcome),
                        Err(err) => println!("{}", err),
                    }
                }
                _ => println!("Usage: settle <reference> <ok|fail>"),
            },
            "confirm" => {
                let Some(token) = require_session(&session) else {
                    continue;
                };
                let Some(reference) = parts.next() else {
                    println!("Usage: confirm <reference>");
                    continue;
                };
                match shop.confirm_payment(token, reference) {
                    Ok(checkout) => {
                        if checkout.replayed {
                            println!("Payment already fulfilled as order {}", checkout.order.id.0);
                        } else {
                            println!("Payment successful: order {}", checkout.order.id.0);
                        }
                        print_profile(&checkout.user);
                    }
                    Err(err) => println!("Payment confirmation failed: {}", err),
                }
            }
            "orders" => {
                let Some(token) = require_session(&session) else {
                    continue;
                };
                match shop.orders(token) {
                    Ok(orders) => print_orders(&orders),
                    Err(err) => println!("{}", err),
                }
            }
            "journey" => {
                let Some(token) = require_session(&session) else {
                    continue;
                };
                match shop.journey(token) {
                    Ok(records) => print_journey(&records),
                    Err(err) => println!("{}", err),
                }
            }
            _ => println!("Unknown command: {} (try help)", cmd),
        }
    }

    Ok(())
}

fn require_session(session: &Option<String>) -> Option<&str> {
    if session.is_none() {
        println!("Log in or register first.");
    }
    session.as_deref()
}

fn format_price(cents: i64) -> String {
    format!("${}.{:02}", cents / 100, (cents % 100).abs())
}

fn print_health<P: mystic_market::payment::PaymentProcessor>(shop: &Storefront<P>) {
    match shop.health() {
        Ok(report) => println!(
            "Status: {} (users={}, artworks={}, orders={})",
            report.status, report.users, report.artworks, report.orders
        ),
        Err(err) => println!("Status: unhealthy ({})", err),
    }
}

fn print_profile(profile: &PublicProfile) {
    println!(
        "{} <{}> | level {} | insights {} | gates unlocked through {}",
        profile.username,
        profile.email,
        profile.spiritual_level,
        profile.total_insights,
        profile.highest_gate_unlocked
    );
}

fn print_catalog(listings: &[CatalogListing]) {
    for listing in listings {
        let item = &listing.item;
        let gate = match item.gate {
            Some(gate) => format!("gate {:>2}", gate),
            None => "       -".to_string(),
        };
        let lock = if listing.unlocked { " " } else { "L" };
        println!(
            "{} #{:<3} {} {:<30} {:<20} {:>10}",
            lock,
            item.id.0,
            gate,
            item.title,
            item.artist,
            format_price(item.price)
        );
    }
}

fn print_cart(lines: &[CartLine]) {
    if lines.is_empty() {
        println!("Cart is empty.");
        return;
    }
    let total: i64 = lines.iter().map(|line| line.item.price).sum();
    for line in lines {
        println!(
            "  line {:<3} #{:<3} {:<30} {:>10}",
            line.cart_id.0,
            line.item.id.0,
            line.item.title,
            format_price(line.item.price)
        );
    }
    println!("  total {}", format_price(total));
}

fn print_orders(orders: &[Order]) {
    if orders.is_empty() {
        println!("No orders yet.");
        return;
    }
    for order in orders {
        println!(
            "order {} [{}] {} via {} ({}) at {}",
            order.id.0,
            order.status,
            format_price(order.total_amount),
            order.payment_method,
            order.payment_reference,
            order.created_at.format("%Y-%m-%d %H:%M")
        );
        for line in &order.lines {
            println!("    #{} {} {}", line.id, line.title, format_price(line.price));
        }
    }
}

fn print_journey(records: &[JourneyRecord]) {
    if records.is_empty() {
        println!("No gates completed yet.");
        return;
    }
    for record in records {
        println!(
            "  gate {} completed {}",
            record.gate,
            record.unlocked_at.format("%Y-%m-%d %H:%M")
        );
    }
}
