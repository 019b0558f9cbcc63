//! Storefront client - command line access to the storefront backend

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use storefront_client::api::orders::OrderQuery;
use storefront_client::domain::aggregates::OrderStatus;
use storefront_client::{ClientConfig, RawStatus, ShopSession, StatusView};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "storefront", version, about = "Storefront backend client")]
struct Cli {
    /// Access token; defaults to the one in session storage.
    #[arg(long, env = "STOREFRONT_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Describe an order status (code or label).
    Status { raw: String },
    /// List orders.
    Orders {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        page_size: u32,
        /// Status code or label.
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Show the server cart with totals.
    Cart,
    /// Show the wishlist.
    Wishlist,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)).init();
    let cli = Cli::parse();

    if let Command::Status { raw } = &cli.command {
        print_status(raw);
        return Ok(());
    }

    let config = ClientConfig::from_env()?;
    let session = ShopSession::new(&config)?;
    if let Some(token) = cli.token.as_deref().filter(|t| !t.trim().is_empty()) {
        session.login(token, None).await.context("could not start session with the given token")?;
    }
    anyhow::ensure!(session.is_logged_in(), "no access token; set STOREFRONT_TOKEN or pass --token");

    match cli.command {
        Command::Status { .. } => {}
        Command::Orders { page, page_size, status, search } => {
            let status = match status.as_deref() {
                Some(raw) => Some(RawStatus::from(raw).resolve().with_context(|| format!("unknown order status '{}'", raw))?),
                None => None,
            };
            let query = OrderQuery { page, page_size, status, search_term: search };
            let orders = session.client().orders().list(&query).await?;
            println!("{} orders, page {} of {}", orders.total_count, page, orders.total_pages(page_size));
            for order in &orders.items {
                let view = order.status_view();
                println!(
                    "#{:<10} {:<20} {:>10}  {}",
                    order.order_number.as_deref().unwrap_or("-"),
                    view.label,
                    order.total.map(|t| t.round_dp(2).to_string()).unwrap_or_default(),
                    order.created_at.map(|t| t.format("%Y-%m-%d %H:%M").to_string()).unwrap_or_default(),
                );
            }
        }
        Command::Cart => {
            session.load_products(1, 100).await?;
            let cart = session.fetch_user_cart().await?;
            if cart.is_empty() {
                println!("Cart is empty");
            }
            for line in session.cart_view() {
                println!(
                    "{:<30} {:<12} x{:<3} {}",
                    line.name.as_deref().unwrap_or("(unknown product)"),
                    line.line.key,
                    line.line.quantity.value(),
                    line.line_total,
                );
            }
            println!("{} items, total {}", session.cart_count(), session.cart_amount());
        }
        Command::Wishlist => {
            let items = session.fetch_wishlist().await?;
            for item in &items {
                println!(
                    "{:<8} {:<30} {}",
                    item.product_id,
                    item.name.as_deref().unwrap_or("-"),
                    item.price.as_ref().map(ToString::to_string).unwrap_or_default(),
                );
            }
            println!("{} saved", items.len());
        }
    }
    Ok(())
}

fn print_status(raw: &str) {
    let view = StatusView::describe(&RawStatus::from(raw));
    println!("{} [{}]", view.label, view.badge);
    let next: Vec<String> = view
        .allowed_next
        .iter()
        .filter_map(|code| OrderStatus::from_code(i64::from(*code)))
        .map(|s| format!("{} ({})", s.label(), s.code()))
        .collect();
    if next.is_empty() {
        println!("no further transitions");
    } else {
        println!("next: {}", next.join(", "));
    }
}
