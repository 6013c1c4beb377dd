//! Transactional email.
//!
//! Uses SMTP via lettre for delivery with Askama templates. Every message has
//! a plain text and an HTML part. Without SMTP settings the service runs in
//! log-only mode, which keeps local development free of a mail server.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use eshop_core::{Email, OrderId};

use crate::config::EmailConfig;
use crate::models::{Order, OrderItem, ShippingAddress};

const SENDER_NAME: &str = "E-Shop";

// =============================================================================
// Templates
// =============================================================================

#[derive(Template)]
#[template(path = "email/verify_account.html")]
struct VerifyAccountHtml<'a> {
    username: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/verify_account.txt")]
struct VerifyAccountText<'a> {
    username: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetHtml<'a> {
    username: &'a str,
    link: &'a str,
    minutes: i64,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    username: &'a str,
    link: &'a str,
    minutes: i64,
}

#[derive(Template)]
#[template(path = "email/two_factor_code.html")]
struct TwoFactorCodeHtml<'a> {
    code: &'a str,
    minutes: i64,
}

#[derive(Template)]
#[template(path = "email/two_factor_code.txt")]
struct TwoFactorCodeText<'a> {
    code: &'a str,
    minutes: i64,
}

/// An order line formatted for display.
struct LineView {
    name: String,
    qty: i32,
    price: String,
    subtotal: String,
}

impl From<&OrderItem> for LineView {
    fn from(item: &OrderItem) -> Self {
        Self {
            name: item.name.clone(),
            qty: item.qty,
            price: item.price.display(),
            subtotal: (item.price * item.qty).display(),
        }
    }
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    username: &'a str,
    order_id: OrderId,
    lines: &'a [LineView],
    total: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    username: &'a str,
    order_id: OrderId,
    lines: &'a [LineView],
    total: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/payment_receipt.html")]
struct PaymentReceiptHtml<'a> {
    username: &'a str,
    order_id: OrderId,
    lines: &'a [LineView],
    total: &'a str,
    address: &'a ShippingAddress,
}

#[derive(Template)]
#[template(path = "email/payment_receipt.txt")]
struct PaymentReceiptText<'a> {
    username: &'a str,
    order_id: OrderId,
    lines: &'a [LineView],
    total: &'a str,
    address: &'a ShippingAddress,
}

// =============================================================================
// Service
// =============================================================================

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Clone)]
struct SmtpSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    sender: Option<SmtpSender>,
}

impl EmailService {
    /// Create an email service. `None` gives a log-only service.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::Smtp` if the relay cannot be configured.
    /// Returns `EmailError::InvalidAddress` if the sender address is invalid.
    pub fn new(config: Option<&EmailConfig>) -> Result<Self, EmailError> {
        let Some(config) = config else {
            return Ok(Self::disabled());
        };

        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        let address = config
            .from_address
            .parse()
            .map_err(|_| EmailError::InvalidAddress(config.from_address.clone()))?;

        Ok(Self {
            sender: Some(SmtpSender {
                mailer,
                from: Mailbox::new(Some(SENDER_NAME.to_string()), address),
            }),
        })
    }

    /// A service that only logs what it would send.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { sender: None }
    }

    /// Whether messages actually leave the process.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Send the account verification link after registration.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_verification(
        &self,
        to: &Email,
        username: &str,
        link: &str,
    ) -> Result<(), EmailError> {
        let html = VerifyAccountHtml { username, link }.render()?;
        let text = VerifyAccountText { username, link }.render()?;

        self.send_multipart_email(to, "Verify your E-Shop account", &text, &html)
            .await
    }

    /// Send a password reset link.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_password_reset(
        &self,
        to: &Email,
        username: &str,
        link: &str,
        minutes: i64,
    ) -> Result<(), EmailError> {
        let html = PasswordResetHtml {
            username,
            link,
            minutes,
        }
        .render()?;
        let text = PasswordResetText {
            username,
            link,
            minutes,
        }
        .render()?;

        self.send_multipart_email(to, "Reset your E-Shop password", &text, &html)
            .await
    }

    /// Send the one-time code for the second admin login step.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_two_factor_code(
        &self,
        to: &Email,
        code: &str,
        minutes: i64,
    ) -> Result<(), EmailError> {
        let html = TwoFactorCodeHtml { code, minutes }.render()?;
        let text = TwoFactorCodeText { code, minutes }.render()?;

        self.send_multipart_email(to, "Your E-Shop admin login code", &text, &html)
            .await
    }

    /// Confirm a newly placed order.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_confirmation(
        &self,
        to: &Email,
        username: &str,
        order: &Order,
        link: &str,
    ) -> Result<(), EmailError> {
        let lines: Vec<LineView> = order.order_items.iter().map(LineView::from).collect();
        let total = order.total_price.display();

        let html = OrderConfirmationHtml {
            username,
            order_id: order.id,
            lines: &lines,
            total: &total,
            link,
        }
        .render()?;
        let text = OrderConfirmationText {
            username,
            order_id: order.id,
            lines: &lines,
            total: &total,
            link,
        }
        .render()?;

        let subject = format!("Order #{} confirmed", order.id);
        self.send_multipart_email(to, &subject, &text, &html).await
    }

    /// Send a receipt once an order is paid.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_payment_receipt(
        &self,
        to: &Email,
        username: &str,
        order: &Order,
    ) -> Result<(), EmailError> {
        let lines: Vec<LineView> = order.order_items.iter().map(LineView::from).collect();
        let total = order.total_price.display();

        let html = PaymentReceiptHtml {
            username,
            order_id: order.id,
            lines: &lines,
            total: &total,
            address: &order.shipping_address,
        }
        .render()?;
        let text = PaymentReceiptText {
            username,
            order_id: order.id,
            lines: &lines,
            total: &total,
            address: &order.shipping_address,
        }
        .render()?;

        let subject = format!("Payment received for order #{}", order.id);
        self.send_multipart_email(to, &subject, &text, &html).await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &Email,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let Some(sender) = &self.sender else {
            tracing::info!(to = %to, subject = %subject, "Email delivery disabled, not sending");
            tracing::debug!(body = %text_body, "Unsent email body");
            return Ok(());
        };

        let email = Message::builder()
            .from(sender.from.clone())
            .to(to
                .as_str()
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        sender.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}
