/// Maps the short codes clients send (`en`, `ch_sim`, ...) to tesseract
/// traineddata names. Unknown codes pass through so callers may also send
/// tesseract names directly.
pub fn to_tesseract_code(code: &str) -> &str {
    match code {
        "en" => "eng",
        "ch_sim" => "chi_sim",
        "ch_tra" => "chi_tra",
        "ja" => "jpn",
        "ko" => "kor",
        "de" => "deu",
        "fr" => "fra",
        "es" => "spa",
        "it" => "ita",
        "pt" => "por",
        "ru" => "rus",
        "ar" => "ara",
        "hi" => "hin",
        "th" => "tha",
        "vi" => "vie",
        "nl" => "nld",
        "pl" => "pol",
        "tr" => "tur",
        "uk" => "ukr",
        "cs" => "ces",
        "sv" => "swe",
        "da" => "dan",
        "no" => "nor",
        "fa" => "fas",
        "id" => "ind",
        "ms" => "msa",
        "ta" => "tam",
        "te" => "tel",
        "bn" => "ben",
        "ur" => "urd",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_codes() {
        assert_eq!(to_tesseract_code("en"), "eng");
        assert_eq!(to_tesseract_code("ch_sim"), "chi_sim");
    }

    #[test]
    fn passes_unknown_codes_through() {
        assert_eq!(to_tesseract_code("eng"), "eng");
        assert_eq!(to_tesseract_code("abq"), "abq");
    }
}
