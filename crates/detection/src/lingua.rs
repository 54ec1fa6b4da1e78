//! lingua n-gram detector (accurate stage)

use ::lingua::{Language, LanguageDetector as Lingua, LanguageDetectorBuilder};
use nllb_core::{LanguageCode, Prediction, Result};

use crate::classifier::AccurateClassifier;

pub struct LinguaClassifier {
    detector: Lingua,
}

impl LinguaClassifier {
    /// Build a detector over every language lingua knows. Slow; call once.
    pub fn new() -> Self {
        tracing::info!("Building lingua detector");
        Self {
            detector: LanguageDetectorBuilder::from_all_languages().build(),
        }
    }
}

impl Default for LinguaClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl AccurateClassifier for LinguaClassifier {
    fn classify(&self, text: &str) -> Result<Option<Prediction>> {
        let confidences = self.detector.compute_language_confidence_values(text);

        Ok(confidences.first().and_then(|&(language, confidence)| {
            let code = flores_code(language);
            if code.is_none() {
                tracing::debug!(?language, "lingua result has no supported equivalent");
            }
            code.map(|code| Prediction::new(code, confidence))
        }))
    }
}

/// FLORES-200 equivalent of a lingua language. Macrolanguages map to the
/// variety the translator was trained on.
pub fn flores_code(language: Language) -> Option<LanguageCode> {
    use LanguageCode as C;

    let code = match language {
        Language::Afrikaans => C::AfrLatn,
        Language::Albanian => C::AlsLatn,
        Language::Arabic => C::ArbArab,
        Language::Armenian => C::HyeArmn,
        Language::Azerbaijani => C::AzjLatn,
        Language::Basque => C::EusLatn,
        Language::Belarusian => C::BelCyrl,
        Language::Bengali => C::BenBeng,
        Language::Bokmal => C::NobLatn,
        Language::Bosnian => C::BosLatn,
        Language::Bulgarian => C::BulCyrl,
        Language::Catalan => C::CatLatn,
        Language::Chinese => C::ZhoHans,
        Language::Croatian => C::HrvLatn,
        Language::Czech => C::CesLatn,
        Language::Danish => C::DanLatn,
        Language::Dutch => C::NldLatn,
        Language::English => C::EngLatn,
        Language::Esperanto => C::EpoLatn,
        Language::Estonian => C::EstLatn,
        Language::Finnish => C::FinLatn,
        Language::French => C::FraLatn,
        Language::Ganda => C::LugLatn,
        Language::Georgian => C::KatGeor,
        Language::German => C::DeuLatn,
        Language::Greek => C::EllGrek,
        Language::Gujarati => C::GujGujr,
        Language::Hebrew => C::HebHebr,
        Language::Hindi => C::HinDeva,
        Language::Hungarian => C::HunLatn,
        Language::Icelandic => C::IslLatn,
        Language::Indonesian => C::IndLatn,
        Language::Irish => C::GleLatn,
        Language::Italian => C::ItaLatn,
        Language::Japanese => C::JpnJpan,
        Language::Kazakh => C::KazCyrl,
        Language::Korean => C::KorHang,
        Language::Latin => return None,
        Language::Latvian => C::LvsLatn,
        Language::Lithuanian => C::LitLatn,
        Language::Macedonian => C::MkdCyrl,
        Language::Malay => C::ZsmLatn,
        Language::Maori => C::MriLatn,
        Language::Marathi => C::MarDeva,
        Language::Mongolian => C::KhkCyrl,
        Language::Nynorsk => C::NnoLatn,
        Language::Persian => C::PesArab,
        Language::Polish => C::PolLatn,
        Language::Portuguese => C::PorLatn,
        Language::Punjabi => C::PanGuru,
        Language::Romanian => C::RonLatn,
        Language::Russian => C::RusCyrl,
        Language::Serbian => C::SrpCyrl,
        Language::Shona => C::SnaLatn,
        Language::Slovak => C::SlkLatn,
        Language::Slovene => C::SlvLatn,
        Language::Somali => C::SomLatn,
        Language::Sotho => C::SotLatn,
        Language::Spanish => C::SpaLatn,
        Language::Swahili => C::SwhLatn,
        Language::Swedish => C::SweLatn,
        Language::Tagalog => C::TglLatn,
        Language::Tamil => C::TamTaml,
        Language::Telugu => C::TelTelu,
        Language::Thai => C::ThaThai,
        Language::Tsonga => C::TsoLatn,
        Language::Tswana => C::TsnLatn,
        Language::Turkish => C::TurLatn,
        Language::Ukrainian => C::UkrCyrl,
        Language::Urdu => C::UrdArab,
        Language::Vietnamese => C::VieLatn,
        Language::Welsh => C::CymLatn,
        Language::Xhosa => C::XhoLatn,
        Language::Yoruba => C::YorLatn,
        Language::Zulu => C::ZulLatn,
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(code)
}
