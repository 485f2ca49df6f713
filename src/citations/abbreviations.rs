//! Journal and publisher expansion
//!
//!     Bibliographies exported from ADS use AAS journal macros (`\apj`, `\mnras`) that only
//!     mean something to LaTeX with the right style loaded. Both outputs use the full name.

use once_cell::sync::Lazy;
use std::collections::HashMap;

static JOURNALS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("\\aj", "Astronomical Journal"),
        ("\\actaa", "Acta Astronomica"),
        ("\\araa", "Annual Review of Astronomy and Astrophysics"),
        ("\\apj", "Astrophysical Journal"),
        ("\\apjl", "Astrophysical Journal Letters"),
        ("\\apjs", "Astrophysical Journal Supplement Series"),
        ("\\ao", "Applied Optics"),
        ("\\apss", "Astrophysics and Space Science"),
        ("\\aap", "Astronomy and Astrophysics"),
        ("\\astap", "Astronomy and Astrophysics"),
        ("\\aapr", "Astronomy and Astrophysics Reviews"),
        ("\\aaps", "Astronomy and Astrophysics Supplement Series"),
        ("\\azh", "Astronomicheskii Zhurnal"),
        ("\\baas", "Bulletin of the American Astronomical Society"),
        ("\\caa", "Chinese Astronomy and Astrophysics"),
        ("\\cjaa", "Chinese Journal of Astronomy and Astrophysics"),
        ("\\icarus", "Icarus"),
        ("\\jcap", "Journal of Cosmology and Astroparticle Physics"),
        ("\\jrasc", "Journal of the Royal Astronomical Society of Canada"),
        ("\\memras", "Memoirs of the Royal Astronomical Society"),
        ("\\mnras", "Monthly Notices of the Royal Astronomical Society"),
        ("\\na", "New Astronomy"),
        ("\\nar", "New Astronomy Reviews"),
        ("\\nat", "Nature"),
        ("\\pasa", "Publications of the Astronomical Society of Australia"),
        ("\\pasj", "Publications of the Astronomical Society of Japan"),
        ("\\pasp", "Publications of the Astronomical Society of the Pacific"),
        ("\\physrep", "Physics Reports"),
        ("\\pra", "Physical Review A"),
        ("\\prb", "Physical Review B"),
        ("\\prc", "Physical Review C"),
        ("\\prd", "Physical Review D"),
        ("\\pre", "Physical Review E"),
        ("\\prl", "Physical Review Letters"),
        ("\\procspie", "Proceedings of the SPIE"),
        ("\\qjras", "Quarterly Journal of the Royal Astronomical Society"),
        ("\\skytel", "Sky and Telescope"),
        ("\\solphys", "Solar Physics"),
        ("\\sovast", "Soviet Astronomy"),
        ("\\ssr", "Space Science Reviews"),
        ("\\zap", "Zeitschrift fuer Astrophysik"),
    ])
});

static PUBLISHERS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("AIP", "American Institute of Physics"),
        ("ASP", "Astronomical Society of the Pacific"),
        ("CUP", "Cambridge University Press"),
        ("OUP", "Oxford University Press"),
        ("PUP", "Princeton University Press"),
        ("UCP", "University of Chicago Press"),
        ("Springer", "Springer-Verlag"),
        ("Wiley", "John Wiley & Sons"),
    ])
});

/// Full journal name for an AAS macro, or the value unchanged
pub fn expand_journal(journal: &str) -> String {
    JOURNALS
        .get(journal.trim())
        .map(|name| name.to_string())
        .unwrap_or_else(|| journal.to_string())
}

/// Full publisher name for a known short form, or the value unchanged
pub fn expand_publisher(publisher: &str) -> String {
    PUBLISHERS
        .get(publisher.trim())
        .map(|name| name.to_string())
        .unwrap_or_else(|| publisher.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_known_journal() {
        assert_eq!(expand_journal("\\mnras"), "Monthly Notices of the Royal Astronomical Society");
        assert_eq!(expand_journal("\\apj"), "Astrophysical Journal");
    }

    #[test]
    fn test_unknown_values_pass_through() {
        assert_eq!(expand_journal("Journal of Things"), "Journal of Things");
        assert_eq!(expand_publisher("Acme Books"), "Acme Books");
    }

    #[test]
    fn test_expand_publisher() {
        assert_eq!(expand_publisher("CUP"), "Cambridge University Press");
    }
}
