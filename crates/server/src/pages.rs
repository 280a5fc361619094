//! 服务端渲染的 HTML 页面（西班牙语界面）

use axum::response::Html;
use certportal_common::models::CertificateView;
use chrono::NaiveDate;

const SITE_NAME: &str = "Instituto Humanista de Psicoterapia";

const CSS: &str = r#"<style>
*{box-sizing:border-box}body{margin:0;font-family:system-ui,sans-serif;background:#f8fafc;color:#1e293b}
a{color:#2563eb}header.bar{background:#fff;border-bottom:1px solid #e2e8f0;padding:14px 24px;display:flex;justify-content:space-between;align-items:center}
.brand{font-family:Georgia,serif;font-weight:700;color:#142850;font-size:20px;text-decoration:none}
main{max-width:1040px;margin:0 auto;padding:32px 24px}.hero{background:#142850;color:#fff;padding:64px 24px;text-align:center}
.card{background:#fff;border:1px solid #e2e8f0;border-radius:16px;padding:24px;margin-bottom:24px}
.grid{display:grid;grid-template-columns:repeat(auto-fit,minmax(220px,1fr));gap:16px}
input{width:100%;padding:12px;border:1px solid #cbd5e1;border-radius:10px;font-size:15px}
button,.btn{display:inline-block;background:#2563eb;color:#fff;border:0;border-radius:10px;padding:12px 20px;font-weight:600;text-decoration:none;cursor:pointer}
.btn.light{background:#fff;color:#334155;border:1px solid #cbd5e1}.error{background:#fef2f2;color:#b91c1c;border:1px solid #fecaca;border-radius:10px;padding:12px;margin-bottom:16px}
.badge{color:#15803d;background:#f0fdf4;border:1px solid #bbf7d0;border-radius:999px;padding:4px 12px;font-weight:600;font-size:14px}
table{width:100%;border-collapse:collapse}th,td{text-align:left;padding:12px;border-bottom:1px solid #f1f5f9;white-space:nowrap}
th{font-size:12px;text-transform:uppercase;color:#64748b}code{font-size:12px;color:#2563eb}
iframe{width:100%;min-height:560px;border:0;background:#fff}.muted{color:#64748b}
</style>"#;

const SERVICES: [(&str, &str); 4] = [
    (
        "Psicoterapia",
        "Sesiones de ayuda psicoterapéutica personalizadas para tu bienestar emocional.",
    ),
    (
        "Formación",
        "Programas de formación integral para profesionales de la salud mental.",
    ),
    (
        "Clases",
        "Aprende con nuestros expertos a través de clases teóricas y prácticas.",
    ),
    (
        "Talleres",
        "Participa en talleres intensivos enfocados en el desarrollo humano.",
    ),
];

pub const NOT_FOUND_MESSAGE: &str = "Certificado no encontrado o el enlace es inválido.";
pub const LOOKUP_FAILED_MESSAGE: &str =
    "No se pudo consultar el certificado. Inténtalo de nuevo más tarde.";
pub const INVALID_CODE_MESSAGE: &str = "Formato de QR no válido";
pub const NO_CODE_MESSAGE: &str = "No se detectó ningún código QR en la imagen.";
pub const UNREADABLE_IMAGE_MESSAGE: &str = "No se pudo leer la imagen enviada.";
pub const UPLOAD_TOO_LARGE_MESSAGE: &str =
    "La imagen es demasiado grande. El tamaño máximo es de 20 MB.";
pub const MISSING_FIELDS_MESSAGE: &str = "Completa el nombre y la fecha de certificación.";
pub const BAD_CREDENTIALS_MESSAGE: &str = "Credenciales incorrectas";
pub const ISSUANCE_FAILED_MESSAGE: &str = "Error inesperado generando el certificado.";

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn shell(title: &str, body: &str) -> Html<String> {
    let mut html = String::with_capacity(body.len() + CSS.len() + 256);
    html.push_str("<!DOCTYPE html>\n<html lang=\"es\"><head><meta charset=\"utf-8\">");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">");
    html.push_str("<title>");
    html.push_str(&escape_html(title));
    html.push_str(" | ");
    html.push_str(SITE_NAME);
    html.push_str("</title>");
    html.push_str(CSS);
    html.push_str("</head><body>");
    html.push_str(body);
    html.push_str("</body></html>");
    Html(html)
}

fn error_block(error: Option<&str>) -> String {
    match error {
        Some(message) => format!("<div class=\"error\">{}</div>", escape_html(message)),
        None => String::new(),
    }
}

pub fn landing(error: Option<&str>) -> Html<String> {
    let mut body = String::new();
    body.push_str("<header class=\"bar\"><a class=\"brand\" href=\"/\">");
    body.push_str(SITE_NAME);
    body.push_str("</a><nav><a href=\"#servicios\">Servicios</a> &nbsp; <a href=\"#validar\">Certificados</a> &nbsp; <a href=\"/admin/login\">Portal Admin</a></nav></header>");
    body.push_str("<section class=\"hero\"><h1>Acompañando tu proceso de Desarrollo Humano</h1>");
    body.push_str("<p>Fomentamos el bienestar emocional a través de la formación, la psicoterapia y el aprendizaje continuo.</p></section>");

    body.push_str("<main><div id=\"validar\" class=\"card\"><h2>Valida o descarga tu certificado</h2>");
    body.push_str(&error_block(error));
    body.push_str("<form method=\"get\" action=\"/lookup\"><input type=\"text\" name=\"id\" placeholder=\"Ingresa el UUID de tu certificado...\">");
    body.push_str("<p><button type=\"submit\">Buscar</button> <span class=\"muted\">o también</span> <a class=\"btn light\" href=\"/scan\">Escanear QR</a></p></form></div>");

    body.push_str("<section id=\"servicios\"><h2>Nuestros Servicios</h2>");
    body.push_str("<p class=\"muted\">Ofrecemos un enfoque humanista centrado en la persona, brindando espacios de acompañamiento, crecimiento y formación.</p><div class=\"grid\">");
    for (title, description) in SERVICES {
        body.push_str("<div class=\"card\"><h3>");
        body.push_str(title);
        body.push_str("</h3><p class=\"muted\">");
        body.push_str(description);
        body.push_str("</p></div>");
    }
    body.push_str("</div></section></main>");
    body.push_str("<footer class=\"hero\"><p class=\"muted\">Instituto Humanista de Psicoterapia. Todos los derechos reservados.</p></footer>");
    shell("Inicio", &body)
}

pub fn scan(error: Option<&str>) -> Html<String> {
    let mut body = String::new();
    body.push_str("<main><p><a href=\"/\">Volver</a></p><div class=\"card\"><h1>Escanear Certificado</h1>");
    body.push_str("<p class=\"muted\">Apunta la cámara al código QR impreso en el certificado para validarlo.</p>");
    body.push_str(&error_block(error));
    body.push_str("<form method=\"post\" action=\"/scan\" enctype=\"multipart/form-data\">");
    body.push_str("<input type=\"file\" name=\"frame\" accept=\"image/*\" capture=\"environment\" multiple>");
    body.push_str("<p><button type=\"submit\">Validar</button></p></form></div></main>");
    shell("Escanear", &body)
}

/// 移动端浏览器内嵌 PDF 支持差，改用在线文档查看器
pub fn viewer_url(pdf_url: &str, mobile: bool) -> String {
    if mobile {
        let encoded: String = url::form_urlencoded::byte_serialize(pdf_url.as_bytes()).collect();
        format!("https://docs.google.com/viewer?url={encoded}&embedded=true")
    } else {
        format!("{pdf_url}#toolbar=0")
    }
}

pub fn is_mobile(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    ["iphone", "ipad", "ipod", "android"]
        .iter()
        .any(|needle| ua.contains(needle))
}

pub fn certificate(view: &CertificateView, mobile: bool) -> Html<String> {
    let mut body = String::new();
    body.push_str("<header class=\"bar\"><a href=\"/\">Volver</a><span class=\"badge\">Válido y Auténtico</span></header><main>");
    body.push_str("<div class=\"card\"><h1>");
    body.push_str(&escape_html(&view.full_name.to_uppercase()));
    body.push_str("</h1><p class=\"muted\">ID: <code>");
    body.push_str(&view.id.to_string());
    body.push_str("</code> &middot; Fecha de certificación: ");
    body.push_str(&format_date(view.certification_date));
    body.push_str("</p><p><a class=\"btn light\" href=\"");
    body.push_str(&escape_html(&view.pdf_url));
    body.push_str("\" target=\"_blank\" rel=\"noopener\" download>Descargar</a> <a class=\"btn\" href=\"");
    body.push_str(&escape_html(&view.verification_url));
    body.push_str("\">Compartir</a></p></div>");
    body.push_str("<div class=\"card\"><iframe title=\"Certificado\" src=\"");
    body.push_str(&escape_html(&viewer_url(&view.pdf_url, mobile)));
    body.push_str("\"></iframe></div></main>");
    shell("Certificado", &body)
}

pub fn certificate_missing(message: &str) -> Html<String> {
    let mut body = String::new();
    body.push_str("<main><div class=\"card\" style=\"max-width:440px;margin:64px auto;text-align:center\">");
    body.push_str("<h2>No encontrado</h2><p class=\"muted\">");
    body.push_str(&escape_html(message));
    body.push_str("</p><a class=\"btn\" href=\"/\">Volver al inicio</a></div></main>");
    shell("No encontrado", &body)
}

pub fn login(error: Option<&str>) -> Html<String> {
    let mut body = String::new();
    body.push_str("<main><p><a href=\"/\">Volver al sitio</a></p><div class=\"card\" style=\"max-width:440px;margin:0 auto\">");
    body.push_str("<h2>Portal Admin</h2><p class=\"muted\">Gestión exclusiva de certificados</p>");
    body.push_str(&error_block(error));
    body.push_str("<form method=\"post\" action=\"/admin/login\">");
    body.push_str("<label>Correo Electrónico<input type=\"email\" name=\"email\" required></label>");
    body.push_str("<label>Contraseña<input type=\"password\" name=\"password\" required></label>");
    body.push_str("<p><button type=\"submit\">Ingresar al Panel</button></p></form></div></main>");
    shell("Acceso", &body)
}

pub fn waiting() -> Html<String> {
    shell(
        "Cargando",
        "<main><p class=\"muted\" style=\"text-align:center\">Verificando sesión...</p></main>",
    )
}

fn admin_header() -> &'static str {
    "<header class=\"bar\"><span class=\"brand\">Panel de Administración</span><form method=\"post\" action=\"/admin/logout\"><button class=\"btn light\" type=\"submit\">Cerrar Sesión</button></form></header>"
}

pub fn dashboard(certificates: &[CertificateView], error: Option<&str>) -> Html<String> {
    let mut body = String::new();
    body.push_str(admin_header());
    body.push_str("<main><div style=\"display:flex;justify-content:space-between;align-items:center\"><div><h1>Certificados Emitidos</h1>");
    body.push_str("<p class=\"muted\">Gestiona los registros públicos de validez</p></div><a class=\"btn\" href=\"/admin/create\">Crear Certificado</a></div>");
    body.push_str(&error_block(error));
    body.push_str("<div class=\"card\"><table><thead><tr><th>ID (UUID)</th><th>Nombre Completo</th><th>Fecha Certificación</th><th>Fecha Registro</th><th>Acciones</th></tr></thead><tbody>");
    if certificates.is_empty() {
        body.push_str("<tr><td colspan=\"5\" class=\"muted\" style=\"text-align:center\"><p>No hay certificados todavía.</p><p>Comienza creando uno nuevo con el botón superior.</p></td></tr>");
    }
    for cert in certificates {
        body.push_str("<tr><td><code>");
        body.push_str(&cert.id.to_string());
        body.push_str("</code></td><td>");
        body.push_str(&escape_html(&cert.full_name));
        body.push_str("</td><td>");
        body.push_str(&cert.certification_date.format("%Y-%m-%d").to_string());
        body.push_str("</td><td class=\"muted\">");
        body.push_str(&format_date(cert.created_at.date_naive()));
        body.push_str("</td><td><a href=\"");
        body.push_str(&escape_html(&cert.verification_url));
        body.push_str("\" title=\"URL Validación\">Validar</a> &middot; <a href=\"");
        body.push_str(&escape_html(&cert.pdf_url));
        body.push_str("\" target=\"_blank\" rel=\"noopener\">PDF</a></td></tr>");
    }
    body.push_str("</tbody></table></div></main>");
    shell("Panel", &body)
}

pub fn create(full_name: &str, certification_date: NaiveDate, error: Option<&str>) -> Html<String> {
    let date = certification_date.format("%Y-%m-%d").to_string();
    let mut body = String::new();
    body.push_str(admin_header());
    body.push_str("<main><p><a href=\"/admin/dashboard\">Volver</a></p><div class=\"grid\"><div class=\"card\"><h2>Detalles del Participante</h2>");
    body.push_str(&error_block(error));
    body.push_str("<form method=\"post\" action=\"/admin/create\">");
    body.push_str("<label>Nombre Completo<input type=\"text\" name=\"full_name\" required placeholder=\"Ej. Juan Pérez López\" value=\"");
    body.push_str(&escape_html(full_name));
    body.push_str("\"></label><label>Fecha de Certificación<input type=\"date\" name=\"certification_date\" required value=\"");
    body.push_str(&date);
    body.push_str("\"></label><p><button type=\"submit\">Generar y Guardar</button> ");
    // 同一表单以 GET 提交回创建页，刷新预览
    body.push_str("<button class=\"btn light\" type=\"submit\" formmethod=\"get\" formaction=\"/admin/create\" formnovalidate>Actualizar vista previa</button></p>");
    body.push_str("<p class=\"muted\">Se generará un PDF y se guardará en la base de datos de forma automática.</p></form></div>");

    let preview_query = format!(
        "full_name={}&certification_date={}",
        url::form_urlencoded::byte_serialize(full_name.as_bytes()).collect::<String>(),
        date
    );
    body.push_str("<div class=\"card\"><p class=\"muted\">Vista Previa del Documento</p><img style=\"width:100%\" alt=\"Vista previa\" src=\"/admin/preview.png?");
    body.push_str(&escape_html(&preview_query));
    body.push_str("\"></div></div></main>");
    shell("Crear Certificado", &body)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn view(name: &str) -> CertificateView {
        let id = Uuid::new_v4();
        CertificateView {
            id,
            full_name: name.to_string(),
            certification_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            created_at: Utc::now().fixed_offset(),
            pdf_url: format!("https://storage.test/{id}.pdf"),
            verification_url: format!("http://localhost/certificate/{id}"),
            valid: true,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>"a" & 'b'</script>"#),
            "&lt;script&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_viewer_url_for_mobile_and_desktop() {
        let url = "https://s.test/a b.pdf";
        assert_eq!(viewer_url(url, false), "https://s.test/a b.pdf#toolbar=0");
        assert_eq!(
            viewer_url(url, true),
            "https://docs.google.com/viewer?url=https%3A%2F%2Fs.test%2Fa+b.pdf&embedded=true"
        );
    }

    #[test]
    fn test_mobile_detection() {
        assert!(is_mobile(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"
        ));
        assert!(is_mobile("Mozilla/5.0 (Linux; Android 14; Pixel 8)"));
        assert!(!is_mobile("Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0"));
    }

    #[test]
    fn test_certificate_page_shows_badge_and_escapes_name() {
        let view = view("<b>Ana</b>");
        let html = certificate(&view, false).0;
        assert!(html.contains("Válido y Auténtico"));
        assert!(html.contains("&lt;B&gt;ANA&lt;/B&gt;"));
        assert!(html.contains(&format!("{}#toolbar=0", view.pdf_url)));
        assert!(html.contains("01/05/2024"));
    }

    #[test]
    fn test_dashboard_empty_state() {
        let html = dashboard(&[], None).0;
        assert!(html.contains("No hay certificados todavía."));
        assert!(html.contains("Crear Certificado"));
    }

    #[test]
    fn test_dashboard_lists_rows_in_given_order() {
        let first = view("Primero");
        let second = view("Segundo");
        let html = dashboard(&[first, second], None).0;
        let a = html.find("Primero").unwrap();
        let b = html.find("Segundo").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_create_form_preview_follows_entered_name() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let html = create("José Núñez", date, None).0;
        assert!(html.contains("value=\"José Núñez\""));
        assert!(html.contains(
            "/admin/preview.png?full_name=Jos%C3%A9+N%C3%BA%C3%B1ez&amp;certification_date=2024-05-01"
        ));
        assert!(html.contains("formmethod=\"get\""));
        assert!(html.contains("Actualizar vista previa"));
    }

    #[test]
    fn test_create_form_prefills_date() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let html = create("", date, None).0;
        assert!(html.contains("value=\"2026-10-18\""));
        assert!(html.contains("/admin/preview.png?full_name=&amp;certification_date=2026-10-18"));
    }
}
