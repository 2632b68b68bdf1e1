use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use client_core::{
    config::normalize_base_url,
    format::{format_currency, format_date, format_percentage, truncate_text},
    load_settings,
    pagination::{page_window, visible_range, PageLink},
    Dashboard, SalesClient,
};
use shared::{
    domain::{SortBy, SortOrder},
    protocol::{FilterOptions, SearchResult},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Browse retail sales transactions")]
struct Cli {
    /// Overrides the configured sales api base url.
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lists the values available for each filter.
    Options,
    /// Searches, filters, sorts and pages through transactions.
    Search(SearchArgs),
}

#[derive(ClapArgs, Debug)]
struct SearchArgs {
    /// Matches customer name or phone number.
    #[arg(long)]
    query: Option<String>,
    #[arg(long = "region")]
    regions: Vec<String>,
    #[arg(long = "gender")]
    genders: Vec<String>,
    #[arg(long = "category")]
    categories: Vec<String>,
    #[arg(long = "tag")]
    tags: Vec<String>,
    #[arg(long = "payment")]
    payment_methods: Vec<String>,
    #[arg(long, allow_hyphen_values = true)]
    age_min: Option<i64>,
    #[arg(long, allow_hyphen_values = true)]
    age_max: Option<i64>,
    /// Earliest sale date, YYYY-MM-DD.
    #[arg(long = "from")]
    date_start: Option<String>,
    /// Latest sale date, YYYY-MM-DD.
    #[arg(long = "to")]
    date_end: Option<String>,
    #[arg(long, default_value_t = SortBy::Date)]
    sort_by: SortBy,
    #[arg(long, default_value_t = SortOrder::Desc)]
    order: SortOrder,
    #[arg(long, default_value_t = 1)]
    page: u32,
    /// Prints the raw result page as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings()?;
    if let Some(api_url) = cli.api_url.as_deref() {
        settings.api_base_url = normalize_base_url(api_url)?;
    }
    let client = SalesClient::from_settings(&settings);
    let mut dashboard = Dashboard::from_settings(client, &settings);

    match cli.command {
        Command::Options => {
            let options = dashboard.wait_for_filter_options().await?;
            print_options(&options);
        }
        Command::Search(args) => {
            let json = args.json;
            apply_search_args(&mut dashboard, args);
            let result = dashboard.wait_for_results().await?;
            info!(
                total_count = result.total_count,
                page = result.page,
                "search: page received"
            );
            if json {
                println!("{}", serde_json::to_string_pretty(result.as_ref())?);
            } else {
                print_results(&result);
            }
        }
    }

    Ok(())
}

fn apply_search_args(dashboard: &mut Dashboard, args: SearchArgs) {
    dashboard.update(|query| {
        if let Some(text) = args.query {
            query.set_search_query(text);
        }
        query.set_customer_regions(args.regions);
        query.set_genders(args.genders);
        query.set_product_categories(args.categories);
        query.set_tags(args.tags);
        query.set_payment_methods(args.payment_methods);
        query.set_age_range(args.age_min, args.age_max);
        query.set_date_range(args.date_start, args.date_end);
        query.set_sorting(args.sort_by, args.order);
        query.set_page(args.page);
    });
}

fn print_options(options: &FilterOptions) {
    let groups = [
        ("Customer regions", &options.customer_regions),
        ("Genders", &options.genders),
        ("Product categories", &options.product_categories),
        ("Payment methods", &options.payment_methods),
        ("Tags", &options.tags),
    ];
    for (title, values) in groups {
        println!("{title}: {}", values.join(", "));
    }
}

fn print_results(result: &SearchResult) {
    if result.items.is_empty() {
        println!("No transactions match the current filters.");
        return;
    }

    println!(
        "{:<12} {:<20} {:<12} {:<22} {:<14} {:>4} {:>14} {:>7} {:>14} {:<8}",
        "Date",
        "Customer",
        "Phone",
        "Product",
        "Category",
        "Qty",
        "Total",
        "Disc",
        "Final",
        "Payment"
    );
    for row in &result.items {
        println!(
            "{:<12} {:<20} {:<12} {:<22} {:<14} {:>4} {:>14} {:>7} {:>14} {:<8}",
            format_date(&row.date.to_string()),
            truncate_text(&row.customer_name, 17),
            row.phone_number,
            truncate_text(&row.product_name, 19),
            truncate_text(&row.product_category, 11),
            row.quantity,
            format_currency(row.total_amount),
            format_percentage(row.discount_percentage),
            format_currency(row.final_amount),
            row.payment_method
        );
    }

    if let Some((first, last)) = visible_range(result.page, result.page_size, result.total_count) {
        let pages = page_window(result.page, result.total_pages)
            .into_iter()
            .map(|link| match link {
                PageLink::Page(page) if page == result.page => format!("[{page}]"),
                PageLink::Page(page) => page.to_string(),
                PageLink::Gap => "...".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ");
        println!();
        println!(
            "Showing {first} to {last} of {} results   {}{pages}{}",
            result.total_count,
            if result.has_previous { "< " } else { "  " },
            if result.has_next { " >" } else { "" }
        );
    }
}
