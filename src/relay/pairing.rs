//! Pairing code display
//!
//! Shows the pairing URI as a scannable QR code while a connect request waits
//! for the wallet, and tears it down once the request settles.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use qrcode::render::unicode;
use qrcode::QrCode;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Surface that shows a pairing URI to the user
pub trait PairingDisplay: Send + Sync {
    /// Show the pairing URI
    fn open(&self, uri: &str);

    /// Hide the pairing URI; closing an already closed display is a no-op
    fn close(&self);
}

/// Render a pairing URI as a block of unicode half-blocks
pub fn render_qr(uri: &str) -> Result<String> {
    let code = QrCode::new(uri.as_bytes())
        .map_err(|e| Error::Internal(format!("QR generation failed: {}", e)))?;

    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

/// Prints the pairing QR code to stderr
pub struct TerminalQrDisplay {
    open: AtomicBool,
    show_uri: bool,
}

impl TerminalQrDisplay {
    pub fn new(show_uri: bool) -> Self {
        Self {
            open: AtomicBool::new(false),
            show_uri,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl PairingDisplay for TerminalQrDisplay {
    fn open(&self, uri: &str) {
        self.open.store(true, Ordering::SeqCst);

        let mut stderr = std::io::stderr().lock();
        match render_qr(uri) {
            Ok(qr) => {
                let _ = writeln!(stderr, "\nScan with your wallet to connect:\n\n{}", qr);
            }
            Err(e) => warn!("Failed to render pairing QR code: {}", e),
        }
        if self.show_uri {
            let _ = writeln!(stderr, "Pairing URI: {}\n", uri);
        }

        info!("Waiting for wallet approval...");
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!("Pairing code closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_qr() {
        let qr = render_qr("wc:abc123@2?relay-protocol=irn&symKey=deadbeef").unwrap();
        assert!(qr.lines().count() > 10);
    }

    #[test]
    fn test_terminal_display_open_close() {
        let display = TerminalQrDisplay::new(false);
        assert!(!display.is_open());

        display.open("wc:abc@2");
        assert!(display.is_open());

        display.close();
        display.close();
        assert!(!display.is_open());
    }
}
