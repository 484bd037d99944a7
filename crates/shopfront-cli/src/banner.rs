use std::path::Path;

use shopfront_config::AppConfig;

/// Print the startup banner with a config summary.
pub fn print_banner(host: &str, port: u16, config: &AppConfig, db_path: &Path) {
    let version = env!("CARGO_PKG_VERSION");

    let url = format!("http://{host}:{port}");
    let db_display = match dirs::home_dir() {
        Some(home) if !home.as_os_str().is_empty() => db_path
            .to_string_lossy()
            .replace(home.to_string_lossy().as_ref(), "~"),
        _ => db_path.to_string_lossy().to_string(),
    };
    let timeout = format!("{} min idle", config.session.idle_timeout_minutes);
    let log = format!("{} ({:?})", config.log.level, config.log.format).to_lowercase();

    // Layout
    let width = 70;
    let left_w = 33;
    let right_w = width - left_w - 3; // 3 for "│ " + "│"

    let title = format!("Shopfront v{version}");
    let title_dashes = width - 2 - title.len() - 5; // 2 for ╭╮, 5 for "─── " + " "
    let top = format!("╭─── {title} {}╮", "─".repeat(title_dashes));
    let bottom = format!("╰{}╯", "─".repeat(width - 2));

    let row = |l: &str, r: &str| format!("│ {:<left_w$}│  {:<right_w$}│", l, r);
    let store: String = config.store.name.chars().take(left_w - 2).collect();

    println!("{top}");
    println!("{}", row("", ""));
    println!("{}", row(&format!("  {store}"), "Storefront"));
    println!("{}", row("", &url));
    println!("{}", row("     ___________", &"─".repeat(right_w - 2)));
    println!(
        "{}",
        row("    /___________\\", &format!("Backoffice  {url}/admin"))
    );
    println!(
        "{}",
        row("    |  |  _  |  |", &format!("Currency    {}", config.store.currency_symbol))
    );
    println!("{}", row("    |__|_|_|_|__|", &format!("Sessions    {timeout}")));
    println!("{}", row("", &format!("Logging     {log}")));
    println!("{}", row(&format!("  {db_display}"), "Press Ctrl+C to stop"));
    println!("{}", row("", ""));
    println!("{bottom}");
}
