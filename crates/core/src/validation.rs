//! Form validation shared by registration, profile and listing forms.
//!
//! Messages are user-facing and in Portuguese. Validators collect every
//! failing field instead of stopping at the first one, so a form can render
//! all of its inline errors at once.

use core::fmt;

use crate::types::{Address, Cep, Creci, Email, Phone};

/// User-facing validation messages.
pub mod messages {
    pub const NAME_REQUIRED: &str = "Nome é obrigatório";
    pub const EMAIL_INVALID: &str = "E-mail válido é obrigatório";
    pub const EMAIL_TAKEN: &str = "Este e-mail já está cadastrado";
    pub const PHONE_INVALID: &str = "Telefone válido é obrigatório";
    pub const CEP_INVALID: &str = "CEP inválido";
    pub const CITY_REQUIRED: &str = "Cidade é obrigatória";
    pub const STATE_INVALID: &str = "Estado (UF) inválido";
    pub const PASSWORD_TOO_SHORT: &str = "A senha deve ter pelo menos 8 caracteres";
    pub const PASSWORD_MISMATCH: &str = "As senhas não coincidem";
    pub const CRECI_REQUIRED: &str = "CRECI é obrigatório";
    pub const CRECI_INVALID: &str = "CRECI inválido";
    pub const DOCUMENT_REQUIRED: &str = "Envie o documento solicitado";
    pub const TITLE_REQUIRED: &str = "Título é obrigatório";
    pub const PRICE_REQUIRED: &str = "Informe o preço";
    pub const TYPE_REQUIRED: &str = "Selecione o tipo do imóvel";
    pub const PURPOSE_REQUIRED: &str = "Selecione a finalidade";
}

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Brazilian state codes.
pub const STATES: &[&str] = &[
    "AC", "AL", "AP", "AM", "BA", "CE", "DF", "ES", "GO", "MA", "MT", "MS", "MG", "PA", "PB", "PR",
    "PE", "PI", "RJ", "RN", "RS", "RO", "RR", "SC", "SP", "SE", "TO",
];

/// Field-level validation failures, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<(&'static str, String)>,
}

impl ValidationErrors {
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Record a message for a field. Only the first message per field is kept.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        if self.get(field).is_none() {
            self.errors.push((field, message.into()));
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Message for a field, if it failed.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, message)| message.as_str())
    }

    /// First message overall, for a form-level banner.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.errors.first().map(|(_, message)| message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.errors
            .iter()
            .map(|(field, message)| (*field, message.as_str()))
    }

    /// `Ok(())` when nothing failed.
    ///
    /// # Errors
    ///
    /// Returns `self` if any field failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .errors
            .iter()
            .map(|(_, message)| message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

impl std::error::Error for ValidationErrors {}

/// Name must have at least one non-space character.
pub fn check_name(name: &str, errors: &mut ValidationErrors) {
    if name.trim().is_empty() {
        errors.add("name", messages::NAME_REQUIRED);
    }
}

pub fn check_email(email: &str, errors: &mut ValidationErrors) -> Option<Email> {
    Email::parse(email)
        .inspect_err(|_| errors.add("email", messages::EMAIL_INVALID))
        .ok()
}

pub fn check_phone(phone: &str, errors: &mut ValidationErrors) -> Option<Phone> {
    Phone::parse(phone)
        .inspect_err(|_| errors.add("phone", messages::PHONE_INVALID))
        .ok()
}

/// City and state are required, CEP is optional but must be valid if given.
pub fn check_address(address: &Address, errors: &mut ValidationErrors) {
    if !address.cep.trim().is_empty() && Cep::parse(&address.cep).is_err() {
        errors.add("cep", messages::CEP_INVALID);
    }
    if address.city.trim().is_empty() {
        errors.add("city", messages::CITY_REQUIRED);
    }
    let state = address.state.trim().to_ascii_uppercase();
    if !STATES.contains(&state.as_str()) {
        errors.add("state", messages::STATE_INVALID);
    }
}

pub fn check_password(password: &str, confirmation: &str, errors: &mut ValidationErrors) {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.add("password", messages::PASSWORD_TOO_SHORT);
    } else if password != confirmation {
        errors.add("password_confirm", messages::PASSWORD_MISMATCH);
    }
}

/// A CRECI that must be present.
pub fn check_creci(creci: &str, errors: &mut ValidationErrors) -> Option<Creci> {
    if creci.trim().is_empty() {
        errors.add("creci", messages::CRECI_REQUIRED);
        return None;
    }
    Creci::parse(creci)
        .inspect_err(|_| errors.add("creci", messages::CRECI_INVALID))
        .ok()
}

/// Normalizes a typed address: trims everything, uppercases the UF and
/// reformats a valid CEP.
#[must_use]
pub fn normalize_address(address: &Address) -> Address {
    let cep = Cep::parse(&address.cep).map_or_else(|_| address.cep.trim().to_string(), |c| c.formatted());
    Address {
        street: address.street.trim().to_string(),
        number: address.number.trim().to_string(),
        complement: address.complement.trim().to_string(),
        bairro: address.bairro.trim().to_string(),
        city: address.city.trim().to_string(),
        state: address.state.trim().to_ascii_uppercase(),
        cep,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_address() -> Address {
        Address {
            street: "Av. Paulista".into(),
            number: "1000".into(),
            city: "São Paulo".into(),
            state: "sp".into(),
            cep: "01310-100".into(),
            ..Address::default()
        }
    }

    #[test]
    fn test_empty_phone_message() {
        let mut errors = ValidationErrors::new();
        assert!(check_phone("", &mut errors).is_none());
        assert_eq!(errors.get("phone"), Some("Telefone válido é obrigatório"));
    }

    #[test]
    fn test_collects_every_failing_field() {
        let mut errors = ValidationErrors::new();
        check_name(" ", &mut errors);
        check_email("nao-e-email", &mut errors);
        check_address(&Address::default(), &mut errors);

        let fields: Vec<_> = errors.iter().map(|(field, _)| field).collect();
        assert_eq!(fields, vec!["name", "email", "city", "state"]);
        assert_eq!(errors.first(), Some(messages::NAME_REQUIRED));
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_first_message_per_field_wins() {
        let mut errors = ValidationErrors::new();
        errors.add("creci", "primeira");
        errors.add("creci", "segunda");
        assert_eq!(errors.get("creci"), Some("primeira"));
        assert_eq!(errors.iter().count(), 1);
    }

    #[test]
    fn test_valid_address_passes() {
        let mut errors = ValidationErrors::new();
        check_address(&valid_address(), &mut errors);
        assert!(errors.is_empty());

        let normalized = normalize_address(&valid_address());
        assert_eq!(normalized.state, "SP");
        assert_eq!(normalized.cep, "01310-100");
    }

    #[test]
    fn test_bad_cep() {
        let mut errors = ValidationErrors::new();
        let address = Address {
            cep: "123".into(),
            ..valid_address()
        };
        check_address(&address, &mut errors);
        assert_eq!(errors.get("cep"), Some(messages::CEP_INVALID));
    }

    #[test]
    fn test_password_rules() {
        let mut errors = ValidationErrors::new();
        check_password("curta", "curta", &mut errors);
        assert_eq!(errors.get("password"), Some(messages::PASSWORD_TOO_SHORT));

        let mut errors = ValidationErrors::new();
        check_password("senha-forte-1", "senha-forte-2", &mut errors);
        assert_eq!(errors.get("password_confirm"), Some(messages::PASSWORD_MISMATCH));

        let mut errors = ValidationErrors::new();
        check_password("senha-forte-1", "senha-forte-1", &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_creci_required_vs_invalid() {
        let mut errors = ValidationErrors::new();
        check_creci("", &mut errors);
        assert_eq!(errors.get("creci"), Some(messages::CRECI_REQUIRED));

        let mut errors = ValidationErrors::new();
        check_creci("sem numero", &mut errors);
        assert_eq!(errors.get("creci"), Some(messages::CRECI_INVALID));
    }
}
