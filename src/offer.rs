//! Offer form parsing and Markdown rendering.
//!
//! The web app submits a flat form; [`OfferForm::from_fields`] validates it
//! into a typed offer and [`OfferForm::to_message`] renders the text that is
//! later published through an inline query. Markup characters in user text
//! cannot break the message: the bold header lines close and reopen around
//! them, everything else is backslash-escaped for Telegram's legacy Markdown.

use thiserror::Error;

pub const BUY_OR_SELL: &str = "buy-or-sell";
pub const OUR_SUM: &str = "our-sum";
pub const OUR_CURR: &str = "our-curr";
pub const CENTRAL_BANK: &str = "cb";
pub const SUM_OR_RATE: &str = "sum-or-rate";
pub const THEIR_SUM: &str = "their-sum";
pub const THEIR_CURR: &str = "their-curr";
pub const RATE: &str = "rate";
pub const EU_METHODS: &str = "eu-methods";
pub const EU_METHODS_STR: &str = "eu-methods-str";
pub const RU_METHODS: &str = "ru-methods";
pub const RU_METHODS_STR: &str = "ru-methods-str";
pub const LOCATION: &str = "location";
pub const COMMENT: &str = "comment";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("missing required form field '{0}'")]
    MissingField(&'static str),
    #[error("invalid value '{value}' for form field '{field}'")]
    InvalidChoice { field: &'static str, value: String },
}

/// Submitted form as an ordered multi-map; repeated names keep every value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    pairs: Vec<(String, String)>,
}

impl FormFields {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pairs.iter().any(|(key, _)| key == name)
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn all(&self, name: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn required(&self, name: &'static str) -> Result<String, FormError> {
        self.first(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or(FormError::MissingField(name))
    }

    fn optional(&self, name: &str) -> String {
        self.first(name).map(str::trim).unwrap_or_default().to_string()
    }
}

impl<K, V> FromIterator<(K, V)> for FormFields
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    fn parse(value: &str) -> Result<Self, FormError> {
        match value {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(FormError::InvalidChoice {
                field: BUY_OR_SELL,
                value: other.to_string(),
            }),
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Self::Buy => "Куплю",
            Self::Sell => "Продам",
        }
    }

    fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

/// What the user wants in return for their currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterSide {
    CentralBankRate { currency: String },
    FixedSum { sum: String, currency: String },
    CustomRate { currency: String, rate: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferForm {
    pub direction: Direction,
    pub our_sum: String,
    pub our_currency: String,
    pub counter: CounterSide,
    pub eu_methods: Vec<String>,
    pub ru_methods: Vec<String>,
    pub location: String,
    pub comment: String,
}

impl OfferForm {
    pub fn from_fields(fields: &FormFields) -> Result<Self, FormError> {
        let direction = Direction::parse(&fields.required(BUY_OR_SELL)?)?;
        let our_sum = fields.required(OUR_SUM)?;
        let our_currency = fields.required(OUR_CURR)?;
        let currency = fields.required(THEIR_CURR)?;

        let counter = if fields.contains(CENTRAL_BANK) {
            CounterSide::CentralBankRate { currency }
        } else {
            match fields.required(SUM_OR_RATE)?.as_str() {
                "sum" => CounterSide::FixedSum {
                    sum: fields.required(THEIR_SUM)?,
                    currency,
                },
                "rate" => CounterSide::CustomRate {
                    currency,
                    rate: fields.required(RATE)?,
                },
                other => {
                    return Err(FormError::InvalidChoice {
                        field: SUM_OR_RATE,
                        value: other.to_string(),
                    })
                }
            }
        };

        Ok(Self {
            direction,
            our_sum,
            our_currency,
            counter,
            eu_methods: collect_methods(fields, EU_METHODS, EU_METHODS_STR),
            ru_methods: collect_methods(fields, RU_METHODS, RU_METHODS_STR),
            location: fields.optional(LOCATION),
            comment: fields.optional(COMMENT),
        })
    }

    /// Render as a Markdown message; every line ends with `\n`.
    pub fn to_message(&self) -> String {
        let mut message = bold(&format!(
            "{} {} {}",
            self.direction.verb(),
            self.our_sum,
            self.our_currency
        ));
        message.push('\n');

        let counter = match &self.counter {
            CounterSide::CentralBankRate { currency } => format!("{} по ЦБ", currency),
            CounterSide::FixedSum { sum, currency } => format!("{} {}", sum, currency),
            CounterSide::CustomRate { currency, rate } => {
                format!("{} по курсу {}", currency, rate)
            }
        };
        message.push_str(&bold(&format!(
            "{} {}",
            self.direction.opposite().verb(),
            counter
        )));
        message.push('\n');

        push_methods_line(&mut message, "eu", &self.eu_methods);
        push_methods_line(&mut message, "ru", &self.ru_methods);

        if !self.location.is_empty() {
            message.push_str(&format!("Наличные: {}\n", escape_markdown(&self.location)));
        }
        if !self.comment.is_empty() {
            message.push_str(&escape_markdown(&self.comment));
            message.push('\n');
        }

        message
    }
}

/// Parse and render in one step.
pub fn format_offer(fields: &FormFields) -> Result<String, FormError> {
    OfferForm::from_fields(fields).map(|offer| offer.to_message())
}

fn is_markup(ch: char) -> bool {
    matches!(ch, '_' | '*' | '`' | '[')
}

/// Backslash-escape the characters legacy Telegram Markdown treats as markup.
/// Only valid outside an entity; see [`bold`] for text inside one.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if is_markup(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Wrap `text` in bold. Legacy Markdown has no escapes inside an entity, so
/// the span is closed before each markup character and reopened after it:
/// `2*2` becomes `*2*\**2*`. Empty spans are never emitted.
pub fn bold(text: &str) -> String {
    let mut rendered = String::with_capacity(text.len() + 2);
    let mut run = String::new();
    for ch in text.chars() {
        if is_markup(ch) {
            if !run.is_empty() {
                rendered.push_str(&format!("*{}*", run));
                run.clear();
            }
            rendered.push('\\');
            rendered.push(ch);
        } else {
            run.push(ch);
        }
    }
    if !run.is_empty() {
        rendered.push_str(&format!("*{}*", run));
    }
    rendered
}

fn collect_methods(fields: &FormFields, list: &str, addendum: &str) -> Vec<String> {
    let mut methods: Vec<String> = fields
        .all(list)
        .into_iter()
        .map(str::trim)
        .filter(|method| !method.is_empty())
        .map(str::to_string)
        .collect();
    let extra = fields.optional(addendum);
    if !extra.is_empty() {
        methods.push(extra);
    }
    methods
}

fn push_methods_line(message: &mut String, region: &str, methods: &[String]) {
    if methods.is_empty() {
        return;
    }
    let joined = methods
        .iter()
        .map(|method| escape_markdown(method))
        .collect::<Vec<_>>()
        .join(", ");
    message.push_str(&format!("{}: {}\n", region, joined));
}
