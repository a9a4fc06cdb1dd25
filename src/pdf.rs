use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 18.0;
const LINE_HEIGHT: f32 = 6.5;
const BODY_SIZE: f32 = 11.0;

/// Lays out Markdown-ish text on A4 pages with the built-in Helvetica faces.
/// `#` headings are set in bold; every other line is set as-is.
pub fn render(title: &str, text: &str) -> anyhow::Result<Vec<u8>> {
    let (doc, page, layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "content");
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(pdf_error)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_error)?;

    let mut current = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT - MARGIN;

    for line in text.lines() {
        let (text, size, font) = styled(line, &regular, &bold);
        if y - size * 0.4 < MARGIN {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "content");
            current = doc.get_page(page).get_layer(layer);
            y = PAGE_HEIGHT - MARGIN;
        }
        if !text.is_empty() {
            current.use_text(text, size, Mm(MARGIN), Mm(y), font);
        }
        y -= LINE_HEIGHT.max(size * 0.6);
    }

    doc.save_to_bytes().map_err(pdf_error)
}

fn styled<'f>(
    line: &str,
    regular: &'f IndirectFontRef,
    bold: &'f IndirectFontRef,
) -> (String, f32, &'f IndirectFontRef) {
    let level = line.chars().take_while(|c| *c == '#').count();
    let text = winansi(line[level..].trim());
    match level {
        0 => (text, BODY_SIZE, regular),
        1 => (text, 18.0, bold),
        2 => (text, 14.0, bold),
        _ => (text, 12.0, bold),
    }
}

/// The built-in faces only carry WinAnsi glyphs; bars become `#`, emoji are dropped.
fn winansi(line: &str) -> String {
    line.chars()
        .filter_map(|c| match c {
            '█' => Some('#'),
            '•' => Some('-'),
            c if c.is_ascii() => Some(c),
            _ => None,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn pdf_error(err: printpdf::Error) -> anyhow::Error {
    anyhow::anyhow!("pdf rendering failed: {err:?}")
}
