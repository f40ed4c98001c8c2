use chrono::{DateTime, Utc};

/// New-device approval email with the dual approve/deny actions.
///
/// Returns (text, html) bodies.
pub fn login_approval(
    device_label: &str,
    ip_address: &str,
    approve_url: &str,
    deny_url: &str,
    expires_at: &DateTime<Utc>,
) -> (String, String) {
    let text = format!(
        r#"Hi,

Someone is trying to sign in to your TeleCare account from a new device:

  Device: {}
  IP address: {}

If this was you, approve the device here:

{}

If this wasn't you, deny the attempt here:

{}

This link will expire at {} UTC. If you do nothing, the device will not be
able to sign in.

Best regards,
The TeleCare Team
"#,
        device_label, ip_address, approve_url, deny_url, expires_at
    );

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .device {{ background-color: #f8f9fa; border-radius: 4px; padding: 12px 16px; margin: 20px 0; }}
        .button {{ display: inline-block; padding: 12px 24px; color: white; text-decoration: none; border-radius: 4px; margin: 8px 8px 8px 0; }}
        .approve {{ background-color: #198754; }}
        .deny {{ background-color: #dc3545; }}
        .footer {{ margin-top: 30px; padding-top: 20px; border-top: 1px solid #ddd; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>New Sign-In Attempt</h2>
        <p>Someone is trying to sign in to your TeleCare account from a new device:</p>
        <div class="device">
            <strong>Device:</strong> {}<br>
            <strong>IP address:</strong> {}
        </div>
        <p>If this was you, approve the device. If not, deny the attempt.</p>
        <a href="{}" class="button approve">Approve Device</a>
        <a href="{}" class="button deny">Deny</a>
        <p>This link will expire at <strong>{} UTC</strong>. If you do nothing,
        the device will not be able to sign in.</p>
        <div class="footer">
            <p>Best regards,<br>The TeleCare Team</p>
        </div>
    </div>
</body>
</html>"#,
        device_label, ip_address, approve_url, deny_url, expires_at
    );

    (text, html)
}
