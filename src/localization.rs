// Copyright 2025 Wissen Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::{Deserialize, Serialize};

/// Answer language. Unknown codes fall back to German, the default
/// language of the deployment this serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    De,
    En,
}

impl Language {
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "en" | "english" => Language::En,
            _ => Language::De,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::De => "de",
            Language::En => "en",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Returned for empty or whitespace-only questions.
pub fn no_query(lang: Language) -> &'static str {
    match lang {
        Language::De => "Bitte geben Sie eine Frage ein.",
        Language::En => "Please enter a question.",
    }
}

/// Returned when retrieval finds nothing, instead of calling the model
/// with empty context.
pub fn no_results(lang: Language) -> &'static str {
    match lang {
        Language::De => {
            "Dazu habe ich in den indizierten Quellen leider nichts gefunden."
        }
        Language::En => "I could not find anything about that in the indexed sources.",
    }
}

/// Returned when the generation call fails or times out.
pub fn generation_error(lang: Language) -> &'static str {
    match lang {
        Language::De => {
            "Es ist ein Fehler aufgetreten. Bitte versuchen Sie es später erneut."
        }
        Language::En => "An error occurred. Please try again later.",
    }
}

/// Shown instead of a composed answer while the language model backend
/// is unavailable; the closest passages are still listed as sources.
pub fn degraded_notice(lang: Language) -> &'static str {
    match lang {
        Language::De => {
            "Der Sprachdienst ist derzeit nicht verfügbar. Die relevantesten Fundstellen sind unten aufgeführt."
        }
        Language::En => {
            "The language service is currently unavailable. The most relevant passages are listed below."
        }
    }
}

/// The language instruction is part of the prompt text, not a model
/// parameter, so behavior is reproducible across model backends.
pub fn answer_instruction(lang: Language, question: &str) -> String {
    match lang {
        Language::De => format!(
            "Beantworte die folgende Frage ausschließlich anhand des obigen Kontexts auf Deutsch: {}",
            question
        ),
        Language::En => format!(
            "Answer the following question in English, using only the context above: {}",
            question
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_code_falls_back_to_german() {
        assert_eq!(Language::from_code("de"), Language::De);
        assert_eq!(Language::from_code("EN"), Language::En);
        assert_eq!(Language::from_code("fr"), Language::De);
        assert_eq!(Language::from_code(""), Language::De);
    }

    #[test]
    fn test_messages_differ_per_language() {
        assert_ne!(no_results(Language::De), no_results(Language::En));
        assert_ne!(no_query(Language::De), no_query(Language::En));
    }

    #[test]
    fn test_answer_instruction_contains_question() {
        let prompt = answer_instruction(Language::De, "Wann wurde FAPS gegründet?");
        assert!(prompt.contains("auf Deutsch"));
        assert!(prompt.contains("Wann wurde FAPS gegründet?"));
    }
}
