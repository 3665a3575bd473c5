pub fn parse_spanish_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let cleaned = trimmed.replace('.', "").replace(',', ".");
    cleaned.parse::<f64>().ok()
}

pub fn normalize_unit(unit: &str) -> String {
    let trimmed = unit.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if is_lump_sum(trimmed) {
        return "PA".to_string();
    }

    match trimmed.to_lowercase().as_str() {
        "ud" | "u" => "Ud".to_string(),
        "ml" | "m." => "m".to_string(),
        "m2" => "m²".to_string(),
        "m3" => "m³".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        }
    }
}

fn is_lump_sum(unit: &str) -> bool {
    let compact: String = unit
        .chars()
        .filter(|ch| *ch != '.' && *ch != ':')
        .collect();
    compact.eq_ignore_ascii_case("pa")
}

pub fn clean_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<&str>>().join(" ");
    collapsed.replace("- ", "").trim().to_string()
}

pub fn join_description_lines(lines: &[String]) -> String {
    clean_text(&lines.join(" "))
}

pub fn amount_matches(quantity: f64, unit_price: f64, amount: f64, tolerance: f64) -> bool {
    let computed = (quantity * unit_price * 100.0).round() / 100.0;
    (computed - amount).abs() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_spanish_number_handles_thousands_and_decimals() {
        assert_eq!(parse_spanish_number("1.605,90"), Some(1605.90));
        assert_eq!(parse_spanish_number("630,00"), Some(630.0));
        assert_eq!(parse_spanish_number("10653,50"), Some(10653.5));
        assert_eq!(parse_spanish_number("110.289,85"), Some(110289.85));
        assert_eq!(parse_spanish_number(""), None);
        assert_eq!(parse_spanish_number("no number"), None);
    }

    #[test]
    fn normalize_unit_canonicalizes_common_spellings() {
        assert_eq!(normalize_unit("Ml"), "m");
        assert_eq!(normalize_unit("m."), "m");
        assert_eq!(normalize_unit("m2"), "m²");
        assert_eq!(normalize_unit("M3"), "m³");
        assert_eq!(normalize_unit("ud"), "Ud");
        assert_eq!(normalize_unit("u"), "Ud");
        assert_eq!(normalize_unit("P.A."), "PA");
        assert_eq!(normalize_unit("P:A:"), "PA");
        assert_eq!(normalize_unit("pa"), "PA");
        assert_eq!(normalize_unit("kg"), "Kg");
    }

    #[test]
    fn amount_matches_uses_cent_rounding() {
        assert!(amount_matches(630.0, 1.12, 705.60, 0.05));
        assert!(amount_matches(10.0, 5.0, 50.0, 0.05));
        assert!(!amount_matches(10.0, 5.0, 60.0, 0.05));
    }

    #[test]
    fn clean_text_collapses_whitespace_and_wraps() {
        assert_eq!(
            clean_text("  corte  de pavimento  "),
            "corte de pavimento"
        );
        assert_eq!(clean_text("hormi- gonado"), "hormigonado");
    }
}
