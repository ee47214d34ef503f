//! Render whale alerts into Telegram HTML messages.

use crate::models::{AlertType, WhaleAlert};

fn emoji(alert_type: AlertType) -> &'static str {
    match alert_type {
        AlertType::Transfer => "\u{1F40B}",
        AlertType::Mint => "\u{1F30A}",
        AlertType::Burn => "\u{1F525}",
        AlertType::DexTrade => "\u{1F500}",
        AlertType::Bridge => "\u{1F309}",
    }
}

fn explorer_base(chain: &str) -> Option<&'static str> {
    match chain {
        "ethereum" => Some("https://etherscan.io/tx/"),
        "bitcoin" => Some("https://mempool.space/tx/"),
        "solana" => Some("https://solscan.io/tx/"),
        "polygon" => Some("https://polygonscan.com/tx/"),
        "arbitrum" => Some("https://arbiscan.io/tx/"),
        "optimism" => Some("https://optimistic.etherscan.io/tx/"),
        "base" => Some("https://basescan.org/tx/"),
        _ => None,
    }
}

/// `0x1234...abcd`, or the full string when it is already short.
pub fn shorten_address(address: &str) -> String {
    if address.len() <= 12 {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

/// Bold label when known, shortened code-formatted address otherwise.
pub fn label_or_address(address: Option<&str>, label: Option<&str>) -> String {
    if let Some(label) = label {
        return format!("<b>{label}</b>");
    }
    match address {
        Some(address) => format!("<code>{}</code>", shorten_address(address)),
        None => "<code>unknown</code>".to_string(),
    }
}

fn with_commas(value: f64, decimals: usize) -> String {
    let formatted = format!("{value:.decimals$}");
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (formatted, None),
    };
    let negative = int_part.starts_with('-');
    let digits: &str = int_part.trim_start_matches('-');

    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(&frac);
    }
    out
}

/// Token amount with commas, at most 2 decimals for large values.
pub fn format_amount(value: Option<f64>) -> String {
    let Some(value) = value else {
        return "?".to_string();
    };
    if value >= 1_000.0 {
        with_commas(value, 0)
    } else if value >= 1.0 {
        with_commas(value, 2)
    } else {
        format!("{value:.4}")
    }
}

/// USD value with $ sign, millions abbreviated.
pub fn format_usd(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("${}M", with_commas(value / 1_000_000.0, 2))
    } else if value >= 1_000.0 {
        format!("${}", with_commas(value, 0))
    } else {
        format!("${value:.2}")
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn tx_link(chain: &str, tx_hash: &str) -> String {
    match explorer_base(chain) {
        Some(base) => format!("<a href=\"{base}{tx_hash}\">TX</a>"),
        None => format!("<code>{}...</code>", &tx_hash[..tx_hash.len().min(10)]),
    }
}

fn format_transfer_alert(alert: &WhaleAlert) -> String {
    let from = label_or_address(alert.from_address.as_deref(), alert.from_label.as_deref());
    let to = label_or_address(alert.to_address.as_deref(), alert.to_label.as_deref());
    [
        format!(
            "{} <b>{}</b> on {}",
            emoji(alert.alert_type),
            alert.alert_type.as_str().to_uppercase(),
            title_case(&alert.chain)
        ),
        format!(
            "{} {} ({})",
            format_amount(alert.amount),
            alert.asset_symbol.as_deref().unwrap_or("?"),
            format_usd(alert.usd_value)
        ),
        format!("{from} \u{2192} {to}"),
        tx_link(&alert.chain, &alert.tx_hash),
    ]
    .join("\n")
}

fn format_dex_trade_alert(alert: &WhaleAlert) -> String {
    let trader = label_or_address(alert.from_address.as_deref(), alert.from_label.as_deref());
    [
        format!(
            "{} <b>DEX TRADE</b> on {} ({})",
            emoji(AlertType::DexTrade),
            title_case(&alert.chain),
            alert.protocol.as_deref().unwrap_or("DEX")
        ),
        format!(
            "Sold {} {} \u{2192} Bought {} {}",
            format_amount(alert.amount_sold),
            alert.asset_sold_symbol.as_deref().unwrap_or("?"),
            format_amount(alert.amount_bought),
            alert.asset_bought_symbol.as_deref().unwrap_or("?")
        ),
        format!("Value: {}", format_usd(alert.usd_value)),
        format!("Trader: {trader}"),
        tx_link(&alert.chain, &alert.tx_hash),
    ]
    .join("\n")
}

fn format_bridge_alert(alert: &WhaleAlert) -> String {
    let from = label_or_address(alert.from_address.as_deref(), alert.from_label.as_deref());
    let to = label_or_address(alert.to_address.as_deref(), alert.to_label.as_deref());
    [
        format!(
            "{} <b>BRIDGE</b> via {}",
            emoji(AlertType::Bridge),
            alert.protocol.as_deref().unwrap_or("Bridge")
        ),
        format!(
            "{} {} ({})",
            format_amount(alert.amount),
            alert.asset_symbol.as_deref().unwrap_or("?"),
            format_usd(alert.usd_value)
        ),
        format!(
            "{} \u{2192} {}",
            title_case(alert.source_chain.as_deref().unwrap_or("?")),
            title_case(alert.destination_chain.as_deref().unwrap_or("?"))
        ),
        format!("{from} \u{2192} {to}"),
        tx_link(&alert.chain, &alert.tx_hash),
    ]
    .join("\n")
}

/// Route to the right formatter based on alert type.
pub fn format_alert(alert: &WhaleAlert) -> String {
    match alert.alert_type {
        AlertType::DexTrade => format_dex_trade_alert(alert),
        AlertType::Bridge => format_bridge_alert(alert),
        _ => format_transfer_alert(alert),
    }
}
