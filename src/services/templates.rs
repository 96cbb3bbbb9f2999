//! Notification templates, their render context and the subject catalog.

use askama::Template;
use std::collections::HashMap;

use crate::domain::{ShareholderContact, ShopRecord};
use crate::error::NotificationError;

pub const VAR_SHOP: &str = "shop";
pub const VAR_SHAREHOLDER: &str = "shareholder";
pub const VAR_CALLBACK_SHOP_URL: &str = "callbackShopUrl";
pub const VAR_BASE_URL: &str = "baseUrl";
pub const VAR_ERRORS: &str = "errors";
pub const VAR_PAYOUT_ERROR: &str = "payoutError";

pub const TEMPLATE_ACCOUNT_HOLDER_CREATED: &str = "shopNotifications/accountHolderCreated";
pub const TEMPLATE_SELLER_ERRORS: &str = "shopNotifications/sellerEmailWithErrors";
pub const TEMPLATE_OPERATOR_ERRORS: &str = "shopNotifications/operatorEmailWithErrors";
pub const TEMPLATE_OPERATOR_PAYOUT_FAILED: &str = "shopNotifications/operatorEmailPayoutFailed";
pub const TEMPLATE_SHAREHOLDER_VERIFICATION: &str = "shareholderNotifications/verificationRequired";

pub const MSG_ACCOUNT_HOLDER_CREATED_TITLE: &str = "email.account.holder.created.title";
pub const MSG_ACCOUNT_HOLDER_VALIDATION_TITLE: &str = "email.account.holder.validation.title";
pub const MSG_ACCOUNT_HOLDER_PAYOUT_FAILED_TITLE: &str = "email.account.holder.payout.failed.title";
pub const MSG_SHAREHOLDER_VERIFICATION_TITLE: &str = "email.shareholder.verification.title";

#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    Shop(Box<ShopRecord>),
    Shareholder(Box<ShareholderContact>),
    Text(String),
    List(Vec<String>),
}

/// Template variables for a single send, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationContext {
    variables: Vec<(&'static str, ContextValue)>,
}

impl NotificationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable, replacing an earlier value under the same name in place.
    pub fn set(&mut self, name: &'static str, value: ContextValue) {
        match self.variables.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.variables.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ContextValue> {
        self.variables
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, value)| value)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.variables.iter().map(|(name, _)| *name).collect()
    }

    fn shop(&self) -> Result<&ShopRecord, NotificationError> {
        match self.get(VAR_SHOP) {
            Some(ContextValue::Shop(shop)) => Ok(&**shop),
            _ => Err(NotificationError::MissingVariable(VAR_SHOP)),
        }
    }

    fn shareholder(&self) -> Result<&ShareholderContact, NotificationError> {
        match self.get(VAR_SHAREHOLDER) {
            Some(ContextValue::Shareholder(shareholder)) => Ok(&**shareholder),
            _ => Err(NotificationError::MissingVariable(VAR_SHAREHOLDER)),
        }
    }

    fn text(&self, name: &'static str) -> Result<&str, NotificationError> {
        match self.get(name) {
            Some(ContextValue::Text(text)) => Ok(text.as_str()),
            _ => Err(NotificationError::MissingVariable(name)),
        }
    }

    fn list(&self, name: &'static str) -> Result<&[String], NotificationError> {
        match self.get(name) {
            Some(ContextValue::List(items)) => Ok(items.as_slice()),
            _ => Err(NotificationError::MissingVariable(name)),
        }
    }
}

/// Renders a named template against a context.
pub trait TemplateRenderer: Send + Sync {
    fn render(
        &self,
        template: &str,
        context: &NotificationContext,
        locale: &str,
    ) -> Result<String, NotificationError>;
}

#[derive(Template)]
#[template(path = "shop_notifications/account_holder_created.html")]
struct AccountHolderCreatedHtml<'a> {
    lang: &'a str,
    base_url: &'a str,
    shop_name: &'a str,
    contact_name: String,
    callback_url: &'a str,
}

#[derive(Template)]
#[template(path = "shop_notifications/seller_email_with_errors.html")]
struct SellerErrorsHtml<'a> {
    lang: &'a str,
    base_url: &'a str,
    shop_name: &'a str,
    contact_name: String,
    callback_url: &'a str,
    errors: &'a [String],
}

#[derive(Template)]
#[template(path = "shop_notifications/operator_email_with_errors.html")]
struct OperatorErrorsHtml<'a> {
    lang: &'a str,
    base_url: &'a str,
    shop_id: &'a str,
    shop_name: &'a str,
    callback_url: &'a str,
    errors: &'a [String],
}

#[derive(Template)]
#[template(path = "shop_notifications/operator_email_payout_failed.html")]
struct OperatorPayoutFailedHtml<'a> {
    lang: &'a str,
    base_url: &'a str,
    shop_id: &'a str,
    shop_name: &'a str,
    callback_url: &'a str,
    payout_error: &'a str,
}

#[derive(Template)]
#[template(path = "shareholder_notifications/verification_required.html")]
struct ShareholderVerificationHtml<'a> {
    lang: &'a str,
    base_url: &'a str,
    shareholder_name: String,
    callback_url: &'a str,
}

/// Compile-time checked templates under `templates/`, selected by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct AskamaRenderer;

impl AskamaRenderer {
    pub const TEMPLATES: [&'static str; 5] = [
        TEMPLATE_ACCOUNT_HOLDER_CREATED,
        TEMPLATE_SELLER_ERRORS,
        TEMPLATE_OPERATOR_ERRORS,
        TEMPLATE_OPERATOR_PAYOUT_FAILED,
        TEMPLATE_SHAREHOLDER_VERIFICATION,
    ];
}

impl TemplateRenderer for AskamaRenderer {
    fn render(
        &self,
        template: &str,
        context: &NotificationContext,
        locale: &str,
    ) -> Result<String, NotificationError> {
        let base_url = context.text(VAR_BASE_URL)?;
        let callback_url = context.text(VAR_CALLBACK_SHOP_URL)?;

        let html = match template {
            TEMPLATE_ACCOUNT_HOLDER_CREATED => {
                let shop = context.shop()?;
                AccountHolderCreatedHtml {
                    lang: locale,
                    base_url,
                    shop_name: display_shop_name(shop),
                    contact_name: contact_name(shop),
                    callback_url,
                }
                .render()?
            }
            TEMPLATE_SELLER_ERRORS => {
                let shop = context.shop()?;
                SellerErrorsHtml {
                    lang: locale,
                    base_url,
                    shop_name: display_shop_name(shop),
                    contact_name: contact_name(shop),
                    callback_url,
                    errors: context.list(VAR_ERRORS)?,
                }
                .render()?
            }
            TEMPLATE_OPERATOR_ERRORS => {
                let shop = context.shop()?;
                OperatorErrorsHtml {
                    lang: locale,
                    base_url,
                    shop_id: &shop.id,
                    shop_name: display_shop_name(shop),
                    callback_url,
                    errors: context.list(VAR_ERRORS)?,
                }
                .render()?
            }
            TEMPLATE_OPERATOR_PAYOUT_FAILED => {
                let shop = context.shop()?;
                OperatorPayoutFailedHtml {
                    lang: locale,
                    base_url,
                    shop_id: &shop.id,
                    shop_name: display_shop_name(shop),
                    callback_url,
                    payout_error: context.text(VAR_PAYOUT_ERROR)?,
                }
                .render()?
            }
            TEMPLATE_SHAREHOLDER_VERIFICATION => {
                let shareholder = context.shareholder()?;
                ShareholderVerificationHtml {
                    lang: locale,
                    base_url,
                    shareholder_name: shareholder_name(shareholder),
                    callback_url,
                }
                .render()?
            }
            other => return Err(NotificationError::TemplateNotFound(other.to_string())),
        };

        Ok(html)
    }
}

fn display_shop_name(shop: &ShopRecord) -> &str {
    shop.shop_name.as_deref().unwrap_or(&shop.id)
}

fn contact_name(shop: &ShopRecord) -> String {
    shop.contact_information
        .as_ref()
        .map(|contact| join_name(contact.firstname.as_deref(), contact.lastname.as_deref()))
        .unwrap_or_default()
}

fn shareholder_name(shareholder: &ShareholderContact) -> String {
    shareholder
        .name
        .as_ref()
        .map(|name| join_name(name.first_name.as_deref(), name.last_name.as_deref()))
        .unwrap_or_default()
}

fn join_name(first: Option<&str>, last: Option<&str>) -> String {
    [first, last]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Locale-aware subject lines.
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    default_locale: String,
    messages: HashMap<String, HashMap<String, String>>,
}

impl MessageCatalog {
    pub fn empty(default_locale: &str) -> Self {
        Self {
            default_locale: normalize_locale(default_locale),
            messages: HashMap::new(),
        }
    }

    /// Built-in English and French subjects.
    pub fn builtin(default_locale: &str) -> Self {
        let mut catalog = Self::empty(default_locale);
        for (key, en, fr) in [
            (
                MSG_ACCOUNT_HOLDER_CREATED_TITLE,
                "Your payment account has been created",
                "Votre compte de paiement a été créé",
            ),
            (
                MSG_ACCOUNT_HOLDER_VALIDATION_TITLE,
                "Your payment account details need attention",
                "Les informations de votre compte de paiement sont à corriger",
            ),
            (
                MSG_ACCOUNT_HOLDER_PAYOUT_FAILED_TITLE,
                "A payout to a shop has failed",
                "Un versement vers une boutique a échoué",
            ),
            (
                MSG_SHAREHOLDER_VERIFICATION_TITLE,
                "Shareholder verification required",
                "Vérification d'actionnaire requise",
            ),
        ] {
            catalog.insert("en", key, en);
            catalog.insert("fr", key, fr);
        }
        catalog
    }

    pub fn insert(&mut self, locale: &str, key: &str, message: &str) {
        self.messages
            .entry(normalize_locale(locale))
            .or_default()
            .insert(key.to_string(), message.to_string());
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Looks the key up in the requested locale, then in the default locale.
    pub fn resolve(&self, key: &str, locale: &str) -> Result<String, NotificationError> {
        let requested = normalize_locale(locale);
        let lookup = |candidate: &str| self.messages.get(candidate).and_then(|m| m.get(key));

        match lookup(&requested).or_else(|| lookup(&self.default_locale)) {
            Some(message) => Ok(message.clone()),
            None => Err(NotificationError::MessageNotFound {
                key: key.to_string(),
                locale: requested,
            }),
        }
    }
}

/// `fr_FR`, `fr-FR` and `FR` all resolve to `fr`.
pub fn normalize_locale(locale: &str) -> String {
    locale
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ContactInformation;

    fn shop() -> ShopRecord {
        ShopRecord {
            id: "2001".to_string(),
            shop_name: Some("Tea & Co".to_string()),
            contact_information: Some(ContactInformation {
                civility: Some("Mrs".to_string()),
                firstname: Some("Ada".to_string()),
                lastname: Some("Byron".to_string()),
                email: Some("ada@example.com".to_string()),
            }),
            additional_fields: vec![],
        }
    }

    fn shop_context() -> NotificationContext {
        let mut context = NotificationContext::new();
        context.set(VAR_SHOP, ContextValue::Shop(Box::new(shop())));
        context.set(
            VAR_CALLBACK_SHOP_URL,
            ContextValue::Text("https://mp.example.com/mmp/shop/account/shop/2001".to_string()),
        );
        context.set(VAR_BASE_URL, ContextValue::Text("https://connector.example.com".to_string()));
        context
    }

    #[test]
    fn test_context_keeps_insertion_order_and_replaces_in_place() {
        let mut context = shop_context();
        context.set(VAR_BASE_URL, ContextValue::Text("https://other.example.com".to_string()));
        assert_eq!(context.names(), vec![VAR_SHOP, VAR_CALLBACK_SHOP_URL, VAR_BASE_URL]);
        assert_eq!(
            context.get(VAR_BASE_URL),
            Some(&ContextValue::Text("https://other.example.com".to_string()))
        );
    }

    #[test]
    fn test_render_seller_errors_escapes_and_lists_errors() {
        let mut context = shop_context();
        context.set(
            VAR_ERRORS,
            ContextValue::List(vec!["IBAN is invalid".to_string(), "Missing <city>".to_string()]),
        );

        let html = AskamaRenderer.render(TEMPLATE_SELLER_ERRORS, &context, "en").unwrap();

        assert!(html.contains("IBAN is invalid"));
        assert!(html.contains("Missing &#60;city&#62;") || html.contains("Missing &lt;city&gt;"));
        assert!(html.contains("mp.example.com"));
        assert!(html.contains("Ada Byron"));
        assert!(html.contains("lang=\"en\""));
    }

    #[test]
    fn test_render_payout_failed() {
        let mut context = shop_context();
        context.set(VAR_PAYOUT_ERROR, ContextValue::Text("(10_069) Payout failed".to_string()));

        let html = AskamaRenderer
            .render(TEMPLATE_OPERATOR_PAYOUT_FAILED, &context, "en")
            .unwrap();
        assert!(html.contains("(10_069) Payout failed"));
        assert!(html.contains("2001"));
    }

    #[test]
    fn test_unknown_template() {
        let err = AskamaRenderer
            .render("shopNotifications/doesNotExist", &shop_context(), "en")
            .unwrap_err();
        assert!(matches!(err, NotificationError::TemplateNotFound(_)));
    }

    #[test]
    fn test_missing_variable() {
        let err = AskamaRenderer
            .render(TEMPLATE_OPERATOR_ERRORS, &shop_context(), "en")
            .unwrap_err();
        assert!(matches!(err, NotificationError::MissingVariable(VAR_ERRORS)));
    }

    #[test]
    fn test_catalog_resolves_locale_with_fallback() {
        let catalog = MessageCatalog::builtin("en");
        assert_eq!(
            catalog.resolve(MSG_ACCOUNT_HOLDER_PAYOUT_FAILED_TITLE, "fr_FR").unwrap(),
            "Un versement vers une boutique a échoué"
        );
        assert_eq!(
            catalog.resolve(MSG_ACCOUNT_HOLDER_PAYOUT_FAILED_TITLE, "de").unwrap(),
            "A payout to a shop has failed"
        );
        assert!(matches!(
            catalog.resolve("email.unknown", "en"),
            Err(NotificationError::MessageNotFound { .. })
        ));
    }

    #[test]
    fn test_normalize_locale() {
        assert_eq!(normalize_locale("fr-FR"), "fr");
        assert_eq!(normalize_locale("EN_gb"), "en");
        assert_eq!(normalize_locale("de"), "de");
    }
}
