use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::OnceLock;

use memmap2::Mmap;
use pdf_writer::{Name, Pdf, Rect, Ref};
use ttf_parser::Face;

/// One of the four faces of a text family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontFace {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FontFace {
    pub const ALL: [FontFace; 4] = [
        FontFace::Regular,
        FontFace::Bold,
        FontFace::Italic,
        FontFace::BoldItalic,
    ];

    pub fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (true, true) => FontFace::BoldItalic,
            (true, false) => FontFace::Bold,
            (false, true) => FontFace::Italic,
            (false, false) => FontFace::Regular,
        }
    }

    pub fn is_bold(self) -> bool {
        matches!(self, FontFace::Bold | FontFace::BoldItalic)
    }

    pub fn is_italic(self) -> bool {
        matches!(self, FontFace::Italic | FontFace::BoldItalic)
    }

    pub(crate) fn index(self) -> usize {
        match self {
            FontFace::Regular => 0,
            FontFace::Bold => 1,
            FontFace::Italic => 2,
            FontFace::BoldItalic => 3,
        }
    }

    /// Resource name used in page content streams.
    pub(crate) fn pdf_name(self) -> &'static str {
        match self {
            FontFace::Regular => "F1",
            FontFace::Bold => "F2",
            FontFace::Italic => "F3",
            FontFace::BoldItalic => "F4",
        }
    }

    fn type1_name(self) -> &'static [u8] {
        match self {
            FontFace::Regular => b"Times-Roman",
            FontFace::Bold => b"Times-Bold",
            FontFace::Italic => b"Times-Italic",
            FontFace::BoldItalic => b"Times-BoldItalic",
        }
    }
}

/// Where a face's outlines live on disk, kept so the PDF writer can embed it later.
#[derive(Clone, Debug)]
pub struct FaceSource {
    pub path: PathBuf,
    pub face_index: u32,
    pub family: String,
}

/// Advance widths and vertical ratios for one face.
#[derive(Clone, Debug)]
pub struct FaceMetrics {
    pub(crate) widths_1000: Vec<f32>,
    pub(crate) char_widths_1000: HashMap<char, f32>,
    pub(crate) fallback_width_1000: f32,
    pub line_h_ratio: Option<f32>,
    pub ascender_ratio: Option<f32>,
    pub source: Option<FaceSource>,
}

impl FaceMetrics {
    /// Width of a single character in 1000-units. WinAnsi characters use the
    /// table, anything else the per-char map read from the font's cmap.
    pub fn char_width_1000(&self, ch: char) -> f32 {
        let byte = char_to_winansi(ch);
        if byte >= 32 {
            let w = self.widths_1000[(byte - 32) as usize];
            if w > 0.0 {
                return w;
            }
        }
        self.char_widths_1000
            .get(&ch)
            .copied()
            .unwrap_or(self.fallback_width_1000)
    }

    pub fn word_width(&self, word: &str, font_size: f32) -> f32 {
        word.chars()
            .map(|ch| self.char_width_1000(ch) * font_size / 1000.0)
            .sum()
    }

    pub fn space_width(&self, font_size: f32) -> f32 {
        self.char_width_1000(' ') * font_size / 1000.0
    }

    pub fn ascender(&self, font_size: f32) -> f32 {
        font_size * self.ascender_ratio.unwrap_or(0.75)
    }

    fn builtin(face: FontFace) -> Self {
        let scale = match face {
            FontFace::Regular => 1.0,
            FontFace::Bold | FontFace::BoldItalic => 1.05,
            FontFace::Italic => 0.97,
        };
        FaceMetrics {
            widths_1000: times_widths().into_iter().map(|w| w * scale).collect(),
            char_widths_1000: HashMap::new(),
            fallback_width_1000: 500.0 * scale,
            line_h_ratio: None,
            ascender_ratio: None,
            source: None,
        }
    }
}

/// The four faces of the text family used for measurement and rendering.
#[derive(Clone, Debug)]
pub struct FontBook {
    pub family: String,
    faces: [FaceMetrics; 4],
}

impl FontBook {
    /// Built-in Times metrics; rendering uses the standard Type1 Times fonts.
    pub fn builtin() -> Self {
        FontBook {
            family: "Times".to_string(),
            faces: FontFace::ALL.map(FaceMetrics::builtin),
        }
    }

    /// Look up `family` in the system font directories. Faces that cannot be
    /// found fall back to the regular face of the family, then to built-in Times.
    pub fn load(family: &str) -> Self {
        let t0 = std::time::Instant::now();
        let mut found = 0;
        let faces = FontFace::ALL.map(|face| match load_face(family, face) {
            Some(metrics) => {
                found += 1;
                metrics
            }
            None => FaceMetrics::builtin(face),
        });
        if found == 0 {
            log::warn!("Font family not found: {family}, using built-in Times metrics");
            return FontBook::builtin();
        }
        log::debug!(
            "FontBook::load: {family} ({found}/4 faces) in {:.1}ms",
            t0.elapsed().as_secs_f64() * 1000.0,
        );
        FontBook {
            family: family.to_string(),
            faces,
        }
    }

    pub fn face(&self, face: FontFace) -> &FaceMetrics {
        &self.faces[face.index()]
    }
}

/// Faces found on disk, keyed by lowercased family and style flags.
type FaceIndex = HashMap<(String, bool, bool), (PathBuf, u32)>;

static FACE_INDEX: OnceLock<FaceIndex> = OnceLock::new();

#[cfg(target_os = "macos")]
const SYSTEM_FONT_DIRS: &[&str] = &[
    "/Library/Fonts",
    "/System/Library/Fonts",
    "/System/Library/Fonts/Supplemental",
];
#[cfg(target_os = "macos")]
const HOME_FONT_DIRS: &[&str] = &["Library/Fonts"];

#[cfg(target_os = "linux")]
const SYSTEM_FONT_DIRS: &[&str] = &["/usr/share/fonts", "/usr/local/share/fonts"];
#[cfg(target_os = "linux")]
const HOME_FONT_DIRS: &[&str] = &[".local/share/fonts", ".fonts"];

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
const SYSTEM_FONT_DIRS: &[&str] = &[];
#[cfg(not(any(target_os = "macos", target_os = "linux")))]
const HOME_FONT_DIRS: &[&str] = &[];

/// Directories listed in `SCRIPTURE_FONTS` first, then the platform's own.
fn search_roots() -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = std::env::var_os("SCRIPTURE_FONTS")
        .map(|list| std::env::split_paths(&list).collect())
        .unwrap_or_default();
    roots.extend(SYSTEM_FONT_DIRS.iter().map(PathBuf::from));
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        roots.extend(HOME_FONT_DIRS.iter().map(|d| home.join(d)));
    }
    if cfg!(windows) {
        let windir = std::env::var_os("WINDIR").map_or_else(|| PathBuf::from("C:\\Windows"), PathBuf::from);
        roots.push(windir.join("Fonts"));
    }
    roots
}

fn has_font_extension(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| ["ttf", "otf", "ttc"].iter().any(|x| e.eq_ignore_ascii_case(x)))
}

fn family_of(face: &Face) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|name| name.name_id == ttf_parser::name_id::FAMILY && name.is_unicode())
        .find_map(|name| name.to_string())
}

/// Record every face of the file at `path`. Returns false if it could not be read.
fn index_file(path: &std::path::Path, index: &mut FaceIndex) -> bool {
    let Ok(file) = std::fs::File::open(path) else {
        return false;
    };
    let Ok(data) = (unsafe { Mmap::map(&file) }) else {
        return false;
    };
    let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
    for face_index in 0..count {
        let Ok(face) = Face::parse(&data, face_index) else {
            continue;
        };
        if let Some(family) = family_of(&face) {
            index
                .entry((family.to_lowercase(), face.is_bold(), face.is_italic()))
                .or_insert_with(|| (path.to_path_buf(), face_index));
        }
    }
    true
}

fn build_face_index() -> FaceIndex {
    let t0 = std::time::Instant::now();
    let mut index = FaceIndex::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut parsed = 0usize;

    let mut pending = search_roots();
    while let Some(dir) = pending.pop() {
        if !visited.insert(dir.clone()) {
            continue;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for path in entries.flatten().map(|e| e.path()) {
            if path.is_dir() {
                pending.push(path);
            } else if has_font_extension(&path) && index_file(&path, &mut index) {
                parsed += 1;
            }
        }
    }

    log::info!(
        "Font index: {} dirs, {parsed} files, {} faces in {:.1}ms",
        visited.len(),
        index.len(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );
    index
}

fn find_font_file(family: &str, face: FontFace) -> Option<(PathBuf, u32)> {
    let index = FACE_INDEX.get_or_init(build_face_index);
    index
        .get(&(family.to_lowercase(), face.is_bold(), face.is_italic()))
        .cloned()
}

fn load_face(family: &str, face: FontFace) -> Option<FaceMetrics> {
    let (path, face_index) = find_font_file(family, face)?;
    let file = std::fs::File::open(&path).ok()?;
    let data = unsafe { Mmap::map(&file) }.ok()?;
    let parsed = Face::parse(&data, face_index).ok()?;
    let units = parsed.units_per_em() as f32;
    let advance = |ch: char| {
        parsed
            .glyph_index(ch)
            .and_then(|gid| parsed.glyph_hor_advance(gid))
            .map(|adv| adv as f32 / units * 1000.0)
    };

    let widths_1000: Vec<f32> = (32u8..=255u8)
        .map(|byte| advance(winansi_to_char(byte)).unwrap_or(0.0))
        .collect();

    let mut char_widths_1000 = HashMap::new();
    if let Some(cmap) = parsed.tables().cmap {
        for subtable in cmap.subtables {
            if !subtable.is_unicode() {
                continue;
            }
            subtable.codepoints(|cp| {
                if cp < 0x80 || cp >= 0x3000 {
                    return;
                }
                if let Some(ch) = char::from_u32(cp)
                    && let Some(w) = advance(ch)
                {
                    char_widths_1000.insert(ch, w);
                }
            });
        }
    }

    let fallback_width_1000 = advance('n').unwrap_or(500.0);
    let line_gap = parsed.line_gap() as f32;
    let line_h_ratio =
        (parsed.ascender() as f32 - parsed.descender() as f32 + line_gap) / units;
    let ascender_ratio = parsed.ascender() as f32 / units;

    Some(FaceMetrics {
        widths_1000,
        char_widths_1000,
        fallback_width_1000,
        line_h_ratio: Some(line_h_ratio),
        ascender_ratio: Some(ascender_ratio),
        source: Some(FaceSource {
            path,
            face_index,
            family: family.to_string(),
        }),
    })
}

/// The WinAnsi bytes in 0x80..=0x9F that do not map to the same codepoint.
const WINANSI_HIGH: [(u8, char); 27] = [
    (0x80, '\u{20AC}'),
    (0x82, '\u{201A}'),
    (0x83, '\u{0192}'),
    (0x84, '\u{201E}'),
    (0x85, '\u{2026}'),
    (0x86, '\u{2020}'),
    (0x87, '\u{2021}'),
    (0x88, '\u{02C6}'),
    (0x89, '\u{2030}'),
    (0x8A, '\u{0160}'),
    (0x8B, '\u{2039}'),
    (0x8C, '\u{0152}'),
    (0x8E, '\u{017D}'),
    (0x91, '\u{2018}'),
    (0x92, '\u{2019}'),
    (0x93, '\u{201C}'),
    (0x94, '\u{201D}'),
    (0x95, '\u{2022}'),
    (0x96, '\u{2013}'),
    (0x97, '\u{2014}'),
    (0x98, '\u{02DC}'),
    (0x99, '\u{2122}'),
    (0x9A, '\u{0161}'),
    (0x9B, '\u{203A}'),
    (0x9C, '\u{0153}'),
    (0x9E, '\u{017E}'),
    (0x9F, '\u{0178}'),
];

fn winansi_to_char(byte: u8) -> char {
    WINANSI_HIGH
        .iter()
        .find(|(b, _)| *b == byte)
        .map_or(byte as char, |&(_, ch)| ch)
}

/// WinAnsi byte for `c`, or 0 when the encoding has no slot for it.
pub(crate) fn char_to_winansi(c: char) -> u8 {
    match c as u32 {
        0x20..=0x7F | 0xA0..=0xFF => c as u8,
        _ => WINANSI_HIGH
            .iter()
            .find(|(_, ch)| *ch == c)
            .map_or(0, |&(b, _)| b),
    }
}

/// Convert text to WinAnsi bytes for Type1 font strings, dropping unmappable chars.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .map(char_to_winansi)
        .filter(|&b| b != 0)
        .collect()
}

/// Encode text as big-endian 2-byte glyph IDs for CIDFont content streams.
pub(crate) fn encode_as_gids(text: &str, char_to_gid: &HashMap<char, u16>) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for ch in text.chars() {
        let gid = char_to_gid.get(&ch).copied().unwrap_or(0);
        out.push((gid >> 8) as u8);
        out.push((gid & 0xFF) as u8);
    }
    out
}

/// Times-Roman widths at 1000 units/em for WinAnsi chars 32..=255.
/// ASCII follows the standard AFM; the upper half is approximated.
fn times_widths() -> Vec<f32> {
    const ASCII: [f32; 95] = [
        250.0, 333.0, 408.0, 500.0, 500.0, 833.0, 778.0, 180.0, 333.0, 333.0, 500.0, 564.0,
        250.0, 333.0, 250.0, 278.0, 500.0, 500.0, 500.0, 500.0, 500.0, 500.0, 500.0, 500.0,
        500.0, 500.0, 278.0, 278.0, 564.0, 564.0, 564.0, 444.0, 921.0, 722.0, 667.0, 667.0,
        722.0, 611.0, 556.0, 722.0, 722.0, 333.0, 389.0, 722.0, 611.0, 889.0, 722.0, 722.0,
        556.0, 722.0, 667.0, 556.0, 611.0, 722.0, 722.0, 944.0, 722.0, 722.0, 611.0, 333.0,
        278.0, 333.0, 469.0, 500.0, 333.0, 444.0, 500.0, 444.0, 500.0, 444.0, 333.0, 500.0,
        500.0, 278.0, 278.0, 500.0, 278.0, 778.0, 500.0, 500.0, 500.0, 500.0, 333.0, 389.0,
        278.0, 500.0, 500.0, 722.0, 500.0, 500.0, 444.0, 480.0, 200.0, 480.0, 541.0,
    ];
    (32u8..=255u8)
        .map(|b| match b {
            32..=126 => ASCII[(b - 32) as usize],
            0x85 | 0x97 => 1000.0,                 // ellipsis, em dash
            0x91 | 0x92 | 0x8B | 0x9B => 333.0,    // single quotes, guillemets
            0x93 | 0x94 => 444.0,                  // double quotes
            0x96 => 500.0,                         // en dash
            0xA0 => 250.0,                         // no-break space
            0xC0..=0xDE => 722.0,                  // accented uppercase
            0xDF..=0xFF => 472.0,                  // accented lowercase
            _ => 500.0,
        })
        .collect()
}

/// A face registered in a PDF document.
pub(crate) struct PdfFont {
    pub(crate) pdf_name: &'static str,
    pub(crate) font_ref: Ref,
    pub(crate) char_to_gid: Option<HashMap<char, u16>>,
}

impl PdfFont {
    pub(crate) fn encode(&self, text: &str) -> Vec<u8> {
        match &self.char_to_gid {
            Some(map) => encode_as_gids(text, map),
            None => to_winansi_bytes(text),
        }
    }
}

/// Glyphs kept in a subset: the new glyph id of every used char and the
/// advance of every kept glyph, in 1000-units, sorted by glyph id.
struct GlyphSubset {
    remapper: subsetter::GlyphRemapper,
    gids: HashMap<char, u16>,
    advances: Vec<(u16, f32)>,
}

fn subset_glyphs(face: &Face, used_chars: &HashSet<char>) -> GlyphSubset {
    let units = face.units_per_em() as f32;
    let mut chars: Vec<char> = used_chars.iter().copied().collect();
    chars.sort_unstable();

    let mut subset = GlyphSubset {
        remapper: subsetter::GlyphRemapper::new(),
        gids: HashMap::with_capacity(chars.len()),
        advances: Vec::with_capacity(chars.len()),
    };
    for ch in chars {
        let Some(gid) = face.glyph_index(ch) else {
            continue;
        };
        let new_gid = subset.remapper.remap(gid.0);
        let advance = face.glyph_hor_advance(gid).unwrap_or(0) as f32 / units * 1000.0;
        subset.gids.insert(ch, new_gid);
        subset.advances.push((new_gid, advance));
    }
    subset.advances.sort_by_key(|&(gid, _)| gid);
    subset.advances.dedup_by_key(|&mut (gid, _)| gid);
    subset
}

fn identity_info() -> pdf_writer::types::SystemInfo<'static> {
    pdf_writer::types::SystemInfo {
        registry: pdf_writer::Str(b"Adobe"),
        ordering: pdf_writer::Str(b"Identity"),
        supplement: 0,
    }
}

/// Embed one face as a Type0 font over a CIDFontType2 descendant, subset to
/// the chars the pages use. Returns the char to glyph id map for encoding.
fn embed_truetype(
    pdf: &mut Pdf,
    font_ref: Ref,
    base_name: &str,
    data: &[u8],
    face_index: u32,
    used_chars: &HashSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> Option<HashMap<char, u16>> {
    let face = Face::parse(data, face_index).ok()?;
    let units = face.units_per_em() as f32;
    let scaled = |v: i16| v as f32 / units * 1000.0;
    let ps_name = base_name.replace(' ', "");
    let subset = subset_glyphs(&face, used_chars);

    let program = subsetter::subset(data, face_index, &subset.remapper).unwrap_or_else(|e| {
        log::warn!("Font subsetting failed for {base_name}: {e}, embedding full font");
        data.to_vec()
    });
    let program_len = i32::try_from(program.len()).ok()?;

    let [file_ref, descriptor_ref, cid_ref, cmap_ref] = [alloc(), alloc(), alloc(), alloc()];
    pdf.stream(file_ref, &program).pair(Name(b"Length1"), program_len);

    let bb = face.global_bounding_box();
    pdf.font_descriptor(descriptor_ref)
        .name(Name(ps_name.as_bytes()))
        .flags(pdf_writer::types::FontFlags::NON_SYMBOLIC)
        .bbox(Rect::new(scaled(bb.x_min), scaled(bb.y_min), scaled(bb.x_max), scaled(bb.y_max)))
        .italic_angle(face.italic_angle())
        .ascent(scaled(face.ascender()))
        .descent(scaled(face.descender()))
        .cap_height(face.capital_height().map_or(700.0, scaled))
        .stem_v(80.0)
        .font_file2(file_ref);

    let mut cid = pdf.cid_font(cid_ref);
    cid.subtype(pdf_writer::types::CidFontType::Type2)
        .base_font(Name(ps_name.as_bytes()))
        .system_info(identity_info())
        .font_descriptor(descriptor_ref)
        .default_width(0.0)
        .cid_to_gid_map_predefined(Name(b"Identity"));
    if !subset.advances.is_empty() {
        let mut widths = cid.widths();
        for &(gid, advance) in &subset.advances {
            widths.consecutive(gid, [advance]);
        }
    }
    drop(cid);

    let cmap_name = format!("{ps_name}-UTF16");
    let mut cmap = pdf_writer::types::UnicodeCmap::new(Name(cmap_name.as_bytes()), identity_info());
    for (&ch, &gid) in &subset.gids {
        cmap.pair(gid, ch);
    }
    pdf.stream(cmap_ref, cmap.finish().as_slice());

    pdf.type0_font(font_ref)
        .base_font(Name(ps_name.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_ref)
        .to_unicode(cmap_ref);

    Some(subset.gids)
}

/// Write the font objects for one face: an embedded subset when the face came
/// from a font file, otherwise the matching standard Times font.
pub(crate) fn register_face(
    pdf: &mut Pdf,
    face: FontFace,
    metrics: &FaceMetrics,
    used_chars: &HashSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> PdfFont {
    let t0 = std::time::Instant::now();
    let font_ref = alloc();

    let embedded = metrics.source.as_ref().and_then(|src| {
        let data = std::fs::read(&src.path).ok()?;
        let name = format!("{}-{:?}", src.family, face);
        embed_truetype(pdf, font_ref, &name, &data, src.face_index, used_chars, alloc)
    });

    if embedded.is_none() {
        if metrics.source.is_some() {
            log::warn!("Embedding failed for {face:?}, using standard Times");
        }
        pdf.type1_font(font_ref)
            .base_font(Name(face.type1_name()))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
    }

    log::debug!(
        "register_face: {face:?} embedded={} → {:.1}ms",
        embedded.is_some(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );

    PdfFont {
        pdf_name: face.pdf_name(),
        font_ref,
        char_to_gid: embedded,
    }
}
