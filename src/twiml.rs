//! Minimal TwiML voice response builder.

use std::fmt;

use htmlescape::encode_minimal;

const XML_PROLOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    Say(String),
    Pause { length: u32 },
    Connect(Vec<Noun>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Noun {
    /// Bidirectional media stream to a websocket URL.
    Stream { url: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        VoiceResponse::default()
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say(text.into()));
        self
    }

    pub fn pause(mut self, length: u32) -> Self {
        self.verbs.push(Verb::Pause { length });
        self
    }

    pub fn connect(mut self, nouns: Vec<Noun>) -> Self {
        self.verbs.push(Verb::Connect(nouns));
        self
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }
}

impl fmt::Display for VoiceResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}<Response>", XML_PROLOG)?;
        for verb in &self.verbs {
            match verb {
                Verb::Say(text) => write!(f, "<Say>{}</Say>", encode_minimal(text))?,
                Verb::Pause { length } => write!(f, r#"<Pause length="{}"/>"#, length)?,
                Verb::Connect(nouns) => {
                    f.write_str("<Connect>")?;
                    for noun in nouns {
                        match noun {
                            Noun::Stream { url } => {
                                write!(f, r#"<Stream url="{}"/>"#, encode_minimal(url))?
                            }
                        }
                    }
                    f.write_str("</Connect>")?;
                }
            }
        }
        f.write_str("</Response>")
    }
}
