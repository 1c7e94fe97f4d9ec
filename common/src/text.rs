//! テキスト正規化
//!
//! 全ての照合処理で使う正規化関数:
//! - normalize: 前後空白除去・大文字化・連続空白の統一
//! - normalize_header: 列見出し用（アクセント除去・英数字以外を除去）
//! - tokenize: 説明文を単語に分割

use regex::Regex;

/// 照合用にテキストを正規化する
///
/// 冪等: `normalize(&normalize(x)) == normalize(x)`
pub fn normalize(s: &str) -> String {
    // 全角スペースも区切りとして扱う
    s.replace('\u{3000}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// 列見出し・シリーズ名の比較用キーに変換する
///
/// "Descripción" → "DESCRIPCION", "Código Fábrica" → "CODIGOFABRICA"
pub fn normalize_header(s: &str) -> String {
    s.chars()
        .flat_map(char::to_uppercase)
        .map(fold_accent)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// 正規化した上で英数字以外を区切りとして単語に分割する
pub fn tokenize(s: &str) -> Vec<String> {
    lazy_static::lazy_static! {
        static ref SEPARATOR_RE: Regex = Regex::new(r"[^\p{L}\p{N}]+").unwrap();
    }

    let normalized = normalize(s);
    SEPARATOR_RE
        .split(&normalized)
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// スペイン語のアクセント付き大文字を基本文字に
fn fold_accent(c: char) -> char {
    match c {
        'Á' | 'À' | 'Ä' | 'Â' => 'A',
        'É' | 'È' | 'Ë' | 'Ê' => 'E',
        'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
        'Ó' | 'Ò' | 'Ö' | 'Ô' => 'O',
        'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
        'Ñ' => 'N',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_uppercases() {
        assert_eq!(normalize(" Mo006 "), normalize("MO006"));
        assert_eq!(normalize("  revision   de frenos "), "REVISION DE FRENOS");
        assert_eq!(normalize("\u{3000}song plus\u{3000}"), "SONG PLUS");
    }

    #[test]
    fn test_normalize_idempotent() {
        let samples = [" Mo006 ", "Cambio  de aceite", "SONG PLUS 2025 BC DM-i", "", "   "];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "冪等でない: {:?}", s);
        }
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("Descripción"), "DESCRIPCION");
        assert_eq!(normalize_header(" Código Fábrica "), "CODIGOFABRICA");
        assert_eq!(normalize_header("Std. Hours (h)"), "STDHOURSH");
        assert_eq!(normalize_header("Año"), "ANO");
    }

    #[test]
    fn test_normalize_header_idempotent() {
        let once = normalize_header("Serie / Vehículo");
        assert_eq!(normalize_header(&once), once);
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Brake pad, front-axle"),
            vec!["BRAKE", "PAD", "FRONT", "AXLE"]
        );
        assert!(tokenize("  ").is_empty());
    }
}
