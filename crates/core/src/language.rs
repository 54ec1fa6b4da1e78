//! FLORES-200 language codes
//!
//! The closed set of `xxx_Yyyy` tags (ISO 639-3 language + ISO 15924 script)
//! accepted by the translator. Anything outside this set is rejected before it
//! reaches an engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

macro_rules! flores_codes {
    ($($variant:ident => $code:literal,)+) => {
        /// A validated FLORES-200 language code
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum LanguageCode {
            $(
                #[serde(rename = $code)]
                $variant,
            )+
        }

        impl LanguageCode {
            /// Every supported code, in alphabetical order
            pub const ALL: &'static [LanguageCode] = &[$(LanguageCode::$variant,)+];

            /// The `xxx_Yyyy` tag
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $code,)+
                }
            }

            fn lookup(code: &str) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

flores_codes! {
    AceArab => "ace_Arab",
    AceLatn => "ace_Latn",
    AcmArab => "acm_Arab",
    AcqArab => "acq_Arab",
    AebArab => "aeb_Arab",
    AfrLatn => "afr_Latn",
    AjpArab => "ajp_Arab",
    AkaLatn => "aka_Latn",
    AlsLatn => "als_Latn",
    AmhEthi => "amh_Ethi",
    ApcArab => "apc_Arab",
    ArbArab => "arb_Arab",
    ArbLatn => "arb_Latn",
    ArsArab => "ars_Arab",
    AryArab => "ary_Arab",
    ArzArab => "arz_Arab",
    AsmBeng => "asm_Beng",
    AstLatn => "ast_Latn",
    AwaDeva => "awa_Deva",
    AyrLatn => "ayr_Latn",
    AzbArab => "azb_Arab",
    AzjLatn => "azj_Latn",
    BakCyrl => "bak_Cyrl",
    BamLatn => "bam_Latn",
    BanLatn => "ban_Latn",
    BelCyrl => "bel_Cyrl",
    BemLatn => "bem_Latn",
    BenBeng => "ben_Beng",
    BhoDeva => "bho_Deva",
    BjnArab => "bjn_Arab",
    BjnLatn => "bjn_Latn",
    BodTibt => "bod_Tibt",
    BosLatn => "bos_Latn",
    BugLatn => "bug_Latn",
    BulCyrl => "bul_Cyrl",
    CatLatn => "cat_Latn",
    CebLatn => "ceb_Latn",
    CesLatn => "ces_Latn",
    CjkLatn => "cjk_Latn",
    CkbArab => "ckb_Arab",
    CrhLatn => "crh_Latn",
    CymLatn => "cym_Latn",
    DanLatn => "dan_Latn",
    DeuLatn => "deu_Latn",
    DikLatn => "dik_Latn",
    DyuLatn => "dyu_Latn",
    DzoTibt => "dzo_Tibt",
    EllGrek => "ell_Grek",
    EngLatn => "eng_Latn",
    EpoLatn => "epo_Latn",
    EstLatn => "est_Latn",
    EusLatn => "eus_Latn",
    EweLatn => "ewe_Latn",
    FaoLatn => "fao_Latn",
    FijLatn => "fij_Latn",
    FinLatn => "fin_Latn",
    FonLatn => "fon_Latn",
    FraLatn => "fra_Latn",
    FurLatn => "fur_Latn",
    FuvLatn => "fuv_Latn",
    GazLatn => "gaz_Latn",
    GlaLatn => "gla_Latn",
    GleLatn => "gle_Latn",
    GlgLatn => "glg_Latn",
    GrnLatn => "grn_Latn",
    GujGujr => "guj_Gujr",
    HatLatn => "hat_Latn",
    HauLatn => "hau_Latn",
    HebHebr => "heb_Hebr",
    HinDeva => "hin_Deva",
    HneDeva => "hne_Deva",
    HrvLatn => "hrv_Latn",
    HunLatn => "hun_Latn",
    HyeArmn => "hye_Armn",
    IboLatn => "ibo_Latn",
    IloLatn => "ilo_Latn",
    IndLatn => "ind_Latn",
    IslLatn => "isl_Latn",
    ItaLatn => "ita_Latn",
    JavLatn => "jav_Latn",
    JpnJpan => "jpn_Jpan",
    KabLatn => "kab_Latn",
    KacLatn => "kac_Latn",
    KamLatn => "kam_Latn",
    KanKnda => "kan_Knda",
    KasArab => "kas_Arab",
    KasDeva => "kas_Deva",
    KatGeor => "kat_Geor",
    KazCyrl => "kaz_Cyrl",
    KbpLatn => "kbp_Latn",
    KeaLatn => "kea_Latn",
    KhkCyrl => "khk_Cyrl",
    KhmKhmr => "khm_Khmr",
    KikLatn => "kik_Latn",
    KinLatn => "kin_Latn",
    KirCyrl => "kir_Cyrl",
    KmbLatn => "kmb_Latn",
    KmrLatn => "kmr_Latn",
    KncArab => "knc_Arab",
    KncLatn => "knc_Latn",
    KonLatn => "kon_Latn",
    KorHang => "kor_Hang",
    LaoLaoo => "lao_Laoo",
    LijLatn => "lij_Latn",
    LimLatn => "lim_Latn",
    LinLatn => "lin_Latn",
    LitLatn => "lit_Latn",
    LmoLatn => "lmo_Latn",
    LtgLatn => "ltg_Latn",
    LtzLatn => "ltz_Latn",
    LuaLatn => "lua_Latn",
    LugLatn => "lug_Latn",
    LuoLatn => "luo_Latn",
    LusLatn => "lus_Latn",
    LvsLatn => "lvs_Latn",
    MagDeva => "mag_Deva",
    MaiDeva => "mai_Deva",
    MalMlym => "mal_Mlym",
    MarDeva => "mar_Deva",
    MinArab => "min_Arab",
    MinLatn => "min_Latn",
    MkdCyrl => "mkd_Cyrl",
    MltLatn => "mlt_Latn",
    MniBeng => "mni_Beng",
    MosLatn => "mos_Latn",
    MriLatn => "mri_Latn",
    MyaMymr => "mya_Mymr",
    NldLatn => "nld_Latn",
    NnoLatn => "nno_Latn",
    NobLatn => "nob_Latn",
    NpiDeva => "npi_Deva",
    NsoLatn => "nso_Latn",
    NusLatn => "nus_Latn",
    NyaLatn => "nya_Latn",
    OciLatn => "oci_Latn",
    OryOrya => "ory_Orya",
    PagLatn => "pag_Latn",
    PanGuru => "pan_Guru",
    PapLatn => "pap_Latn",
    PbtArab => "pbt_Arab",
    PesArab => "pes_Arab",
    PltLatn => "plt_Latn",
    PolLatn => "pol_Latn",
    PorLatn => "por_Latn",
    PrsArab => "prs_Arab",
    QuyLatn => "quy_Latn",
    RonLatn => "ron_Latn",
    RunLatn => "run_Latn",
    RusCyrl => "rus_Cyrl",
    SagLatn => "sag_Latn",
    SanDeva => "san_Deva",
    SatOlck => "sat_Olck",
    ScnLatn => "scn_Latn",
    ShnMymr => "shn_Mymr",
    SinSinh => "sin_Sinh",
    SlkLatn => "slk_Latn",
    SlvLatn => "slv_Latn",
    SmoLatn => "smo_Latn",
    SnaLatn => "sna_Latn",
    SndArab => "snd_Arab",
    SomLatn => "som_Latn",
    SotLatn => "sot_Latn",
    SpaLatn => "spa_Latn",
    SrdLatn => "srd_Latn",
    SrpCyrl => "srp_Cyrl",
    SswLatn => "ssw_Latn",
    SunLatn => "sun_Latn",
    SweLatn => "swe_Latn",
    SwhLatn => "swh_Latn",
    SzlLatn => "szl_Latn",
    TamTaml => "tam_Taml",
    TaqLatn => "taq_Latn",
    TaqTfng => "taq_Tfng",
    TatCyrl => "tat_Cyrl",
    TelTelu => "tel_Telu",
    TgkCyrl => "tgk_Cyrl",
    TglLatn => "tgl_Latn",
    ThaThai => "tha_Thai",
    TirEthi => "tir_Ethi",
    TpiLatn => "tpi_Latn",
    TsnLatn => "tsn_Latn",
    TsoLatn => "tso_Latn",
    TukLatn => "tuk_Latn",
    TumLatn => "tum_Latn",
    TurLatn => "tur_Latn",
    TwiLatn => "twi_Latn",
    TzmTfng => "tzm_Tfng",
    UigArab => "uig_Arab",
    UkrCyrl => "ukr_Cyrl",
    UmbLatn => "umb_Latn",
    UrdArab => "urd_Arab",
    UznLatn => "uzn_Latn",
    VecLatn => "vec_Latn",
    VieLatn => "vie_Latn",
    WarLatn => "war_Latn",
    WolLatn => "wol_Latn",
    XhoLatn => "xho_Latn",
    YddHebr => "ydd_Hebr",
    YorLatn => "yor_Latn",
    YueHant => "yue_Hant",
    ZhoHans => "zho_Hans",
    ZhoHant => "zho_Hant",
    ZsmLatn => "zsm_Latn",
    ZulLatn => "zul_Latn",
}

impl LanguageCode {
    /// ISO 639-3 part of the tag
    pub fn language(&self) -> &'static str {
        &self.as_str()[..3]
    }

    /// ISO 15924 part of the tag
    pub fn script(&self) -> &'static str {
        &self.as_str()[4..]
    }

    /// Parse without allocating an error
    pub fn parse(code: &str) -> Option<Self> {
        Self::lookup(code)
    }
}

impl FromStr for LanguageCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| Error::InvalidInput(format!("unrecognized language code '{s}'")))
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_codes() {
        assert_eq!("eng_Latn".parse::<LanguageCode>().unwrap(), LanguageCode::EngLatn);
        assert_eq!("zho_Hans".parse::<LanguageCode>().unwrap(), LanguageCode::ZhoHans);
        assert_eq!(LanguageCode::parse("spa_Latn"), Some(LanguageCode::SpaLatn));
    }

    #[test]
    fn test_rejects_unknown_and_malformed() {
        for bad in ["", "eng", "eng_latn", "ENG_Latn", "xxx_Latn", "ton_Latn", "eng_Latn "] {
            let err = bad.parse::<LanguageCode>().unwrap_err();
            assert!(err.is_client_error(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_all_codes_round_trip_through_str() {
        assert_eq!(LanguageCode::ALL.len(), 204);
        for code in LanguageCode::ALL {
            assert_eq!(code.as_str().parse::<LanguageCode>().unwrap(), *code);
            assert_eq!(code.as_str().len(), 8);
        }
    }

    #[test]
    fn test_language_and_script_parts() {
        assert_eq!(LanguageCode::YueHant.language(), "yue");
        assert_eq!(LanguageCode::YueHant.script(), "Hant");
        assert_eq!(LanguageCode::EngLatn.to_string(), "eng_Latn");
    }

    #[test]
    fn test_serde_uses_flores_tag() {
        let json = serde_json::to_string(&LanguageCode::ArbArab).unwrap();
        assert_eq!(json, "\"arb_Arab\"");
        let code: LanguageCode = serde_json::from_str("\"kor_Hang\"").unwrap();
        assert_eq!(code, LanguageCode::KorHang);
        assert!(serde_json::from_str::<LanguageCode>("\"klingon\"").is_err());
    }
}
