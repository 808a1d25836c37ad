//! Canned-reply front end that runs before retrieval: input validation,
//! language detection, greeting/gratitude short-circuits and answer
//! formatting.

use crate::settings::CompanyProfile;
use std::fmt;
use tracing::debug;
use whatlang::{Info, Lang};

pub const MAX_MESSAGE_CHARS: usize = 1_000;
pub const EMPTY_MESSAGE: &str = "Please provide a message.";
pub const MESSAGE_TOO_LONG: &str = "Message too long. Please keep it under 1000 characters.";

const SHORT_TEXT_CHARS: usize = 20;

const ENGLISH_GREETINGS: &[&str] = &["hi", "hello", "good morning", "good evening", "thanks", "thank you"];
const ITALIAN_GREETINGS: &[&str] = &["ciao", "buongiorno", "buonasera", "grazie", "prego"];
const FRENCH_GREETINGS: &[&str] = &["bonjour", "salut", "merci"];
const SPANISH_GREETINGS: &[&str] = &["hola", "buenos días", "gracias"];

const CASUAL_PHRASES: &[&str] = &[
    "ciao", "hello", "hi", "bonjour", "salut", "hola", "buongiorno", "good morning",
    "thank you", "thanks", "grazie", "merci", "gracias", "bye", "goodbye", "arrivederci",
    "see you", "take care", "buenos días", "hey there", "hi, how are you?",
];

const GRATITUDE_WORDS: &[&str] = &["thank", "grazie", "merci", "gracias"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Language {
    English,
    Italian,
    French,
    Spanish,
    Other(String),
}

impl Language {
    pub fn code(&self) -> &str {
        match self {
            Self::English => "en",
            Self::Italian => "it",
            Self::French => "fr",
            Self::Spanish => "es",
            Self::Other(code) => code,
        }
    }

    fn from_whatlang(lang: Lang) -> Self {
        match lang {
            Lang::Eng => Self::English,
            Lang::Ita => Self::Italian,
            Lang::Fra => Self::French,
            Lang::Spa => Self::Spanish,
            other => Self::Other(iso_639_1(other).unwrap_or(other.code()).to_string()),
        }
    }
}

/// Two-letter codes for the languages visitors are likely to write in;
/// anything else keeps whatlang's three-letter code.
fn iso_639_1(lang: Lang) -> Option<&'static str> {
    let code = match lang {
        Lang::Deu => "de",
        Lang::Por => "pt",
        Lang::Nld => "nl",
        Lang::Pol => "pl",
        Lang::Ron => "ro",
        Lang::Rus => "ru",
        Lang::Ukr => "uk",
        Lang::Ell => "el",
        Lang::Ara => "ar",
        Lang::Cmn => "zh",
        Lang::Jpn => "ja",
        Lang::Tur => "tr",
        Lang::Swe => "sv",
        _ => return None,
    };
    Some(code)
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannedKind {
    Greeting,
    Gratitude,
}

pub fn validate_input(message: &str) -> Result<&str, &'static str> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(EMPTY_MESSAGE);
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(MESSAGE_TOO_LONG);
    }
    Ok(trimmed)
}

fn normalize(message: &str) -> String {
    message.trim().to_lowercase()
}

pub fn detect_language(message: &str) -> Language {
    let cleaned = normalize(message);

    if cleaned.chars().count() <= SHORT_TEXT_CHARS {
        let tables: [(&[&str], Language); 4] = [
            (ENGLISH_GREETINGS, Language::English),
            (ITALIAN_GREETINGS, Language::Italian),
            (FRENCH_GREETINGS, Language::French),
            (SPANISH_GREETINGS, Language::Spanish),
        ];
        if let Some((_, language)) = tables
            .into_iter()
            .find(|(words, _)| words.contains(&cleaned.as_str()))
        {
            return language;
        }
    }

    language_from_guess(whatlang::detect(&cleaned))
}

fn language_from_guess(guess: Option<Info>) -> Language {
    match guess {
        Some(info) if info.is_reliable() => {
            let language = Language::from_whatlang(info.lang());
            debug!(%language, confidence = info.confidence(), "detected language");
            language
        }
        Some(info) => {
            debug!(
                guess = info.lang().code(),
                confidence = info.confidence(),
                "unreliable language guess, defaulting to italian"
            );
            Language::Italian
        }
        None => {
            debug!("language detection failed, defaulting to italian");
            Language::Italian
        }
    }
}

pub fn classify_canned(message: &str) -> Option<CannedKind> {
    let normalized = normalize(message);
    if !CASUAL_PHRASES.contains(&normalized.as_str()) {
        return None;
    }

    if GRATITUDE_WORDS.iter().any(|word| normalized.contains(word)) {
        Some(CannedKind::Gratitude)
    } else {
        Some(CannedKind::Greeting)
    }
}

pub fn canned_reply(kind: CannedKind, language: &Language, company: &CompanyProfile) -> String {
    let assistant = &company.assistant_name;
    let name = &company.name;

    match (kind, language) {
        (CannedKind::Gratitude, Language::Italian) => {
            "Prego! 😊 C'è qualcos'altro con cui posso aiutarti?".to_string()
        }
        (CannedKind::Gratitude, Language::French) => {
            "Je vous en prie ! 😊 Y a-t-il autre chose que je peux faire pour vous ?".to_string()
        }
        (CannedKind::Gratitude, Language::Spanish) => {
            "¡De nada! 😊 ¿Hay algo más en lo que pueda ayudarte?".to_string()
        }
        (CannedKind::Gratitude, _) => {
            "You're welcome! 😊 Is there anything else I can do for you?".to_string()
        }
        (CannedKind::Greeting, Language::Italian) => {
            format!("Ciao! Sono {assistant} da {name}. Come posso aiutarti oggi?")
        }
        (CannedKind::Greeting, Language::French) => format!(
            "Bonjour! Je suis {assistant} de {name}. Comment puis-je vous aider aujourd'hui?"
        ),
        (CannedKind::Greeting, Language::Spanish) => {
            format!("¡Hola! Soy {assistant} de {name}. ¿Cómo puedo ayudarte hoy?")
        }
        (CannedKind::Greeting, _) => {
            format!("Hello! I'm {assistant} from {name}. How can I help you today?")
        }
    }
}

pub fn format_response(text: &str) -> String {
    let mut formatted = text.trim().to_string();
    if !formatted.is_empty() && !formatted.ends_with(&['.', '!', '?'][..]) {
        formatted.push('.');
    }
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;
    use whatlang::Script;

    #[test]
    fn empty_and_long_messages_are_rejected() {
        assert_eq!(validate_input("   "), Err(EMPTY_MESSAGE));
        assert_eq!(validate_input(&"a".repeat(1_001)), Err(MESSAGE_TOO_LONG));
        assert_eq!(validate_input(&"a".repeat(1_000)).map(str::len), Ok(1_000));
        assert_eq!(validate_input("  ciao  "), Ok("ciao"));
    }

    #[test]
    fn short_greetings_use_the_word_tables() {
        assert_eq!(detect_language("Hello"), Language::English);
        assert_eq!(detect_language(" Buongiorno "), Language::Italian);
        assert_eq!(detect_language("merci"), Language::French);
        assert_eq!(detect_language("Buenos días"), Language::Spanish);
    }

    #[test]
    fn longer_text_uses_statistical_detection() {
        let language = detect_language(
            "Buongiorno, vorrei sapere quali porte blindate avete disponibili nel vostro negozio \
             di Crotone e se è possibile avere un preventivo per la consegna a domicilio",
        );
        assert_eq!(language, Language::Italian);
    }

    #[test]
    fn undetectable_text_defaults_to_italian() {
        assert_eq!(detect_language("1234 5678"), Language::Italian);
    }

    #[test]
    fn unreliable_guess_defaults_to_italian() {
        let shaky = Info::new(Script::Latin, Lang::Eng, 0.4);
        assert_eq!(language_from_guess(Some(shaky)), Language::Italian);

        let sure = Info::new(Script::Latin, Lang::Eng, 1.0);
        assert_eq!(language_from_guess(Some(sure)), Language::English);
    }

    #[test]
    fn other_languages_report_two_letter_codes() {
        let german = language_from_guess(Some(Info::new(Script::Latin, Lang::Deu, 1.0)));
        assert_eq!(german, Language::Other("de".to_string()));
        assert_eq!(german.code(), "de");

        let latvian = language_from_guess(Some(Info::new(Script::Latin, Lang::Lav, 1.0)));
        assert_eq!(latvian.code(), "lav");
    }

    #[test]
    fn only_exact_phrases_are_canned() {
        assert_eq!(classify_canned("  HELLO "), Some(CannedKind::Greeting));
        assert_eq!(classify_canned("hello, which doors do you sell?"), None);
        assert_eq!(classify_canned("hi, how are you?"), Some(CannedKind::Greeting));
    }

    #[test]
    fn gratitude_phrases_pick_the_gratitude_template() {
        assert_eq!(classify_canned("Thank you"), Some(CannedKind::Gratitude));
        assert_eq!(classify_canned("grazie"), Some(CannedKind::Gratitude));
        assert_eq!(classify_canned("thanks"), Some(CannedKind::Gratitude));
        assert_eq!(classify_canned("bye"), Some(CannedKind::Greeting));
    }

    #[test]
    fn canned_replies_are_localized_with_english_fallback() {
        let company = CompanyProfile::default();
        let italian = canned_reply(CannedKind::Greeting, &Language::Italian, &company);
        assert_eq!(italian, "Ciao! Sono Benedetta da Schipani. Come posso aiutarti oggi?");

        let german = canned_reply(
            CannedKind::Gratitude,
            &Language::Other("de".to_string()),
            &company,
        );
        assert!(german.starts_with("You're welcome!"));
    }

    #[test]
    fn responses_end_with_terminal_punctuation() {
        assert_eq!(format_response("  Model X costs 500 euros  "), "Model X costs 500 euros.");
        assert_eq!(format_response("Really?"), "Really?");
        assert_eq!(format_response("   "), "");
    }
}
