//! Metadata parser (C5, §4.5): streams the file's XML header and binary seektable,
//! building the header-template table, the flat codeblock index, the data-chunk
//! table, and the per-level tile grids.

use crate::boxes::{self, ObjectTypeTag, Tag};
use crate::byte_reader::Reader;
use crate::error::{bail, err, FormatError, Result};
use crate::icc::IccMetadata;
use crate::io::PositionalReader;
use crate::model::{
    Codeblock, Coefficient, DataChunk, HeaderTemplate, Image, ImageKind, Level, Tile, NUM_COLOURS,
};
use crate::xml::{parse_hex_u16, Event, Tokenizer};

/// How many bytes are read from the file at a time while scanning the XML header
/// (§4.5).
const CHUNK_SIZE: usize = 1 << 20;

/// Stride, in bytes, of one block-header record when offsets live in the seektable.
const PARTIAL_STRIDE: usize = 48;
/// Stride, in bytes, of one block-header record when offsets are stored inline.
const FULL_STRIDE: usize = 80;
/// Size, in bytes, of one binary seektable entry (§6).
const SEEKTABLE_ENTRY_STRIDE: usize = 24;

/// Top-level result of parsing a container (§3's `Image`, plus global attributes
/// shared by every `Wsi` image).
#[derive(Debug)]
pub struct ParsedContainer {
    /// Every image entry found in the document (one `Wsi`, and optionally `Label`
    /// and/or `Macro`).
    pub images: Vec<Image>,
    /// Width of one coefficient plane, constant across the file.
    pub block_width: u32,
    /// Height of one coefficient plane, constant across the file.
    pub block_height: u32,
    /// Micrometres per pixel at full resolution, if present.
    pub mpp_x: Option<f64>,
    /// See [`ParsedContainer::mpp_x`].
    pub mpp_y: Option<f64>,
    /// Declared ICC profile colour space, if the file embeds one (§1 non-goal: parsed
    /// but not applied).
    pub icc_color_space: Option<&'static str>,
    /// Number of colour channels the declared ICC profile's colour space implies.
    pub icc_channels: Option<u8>,
}

#[derive(Debug, Default, Clone)]
struct ParserFrame {
    tag: String,
    name: Option<String>,
    group: Option<u16>,
    element: Option<u16>,
    object_type: Option<ObjectTypeTag>,
    raw_content_active: bool,
}

#[derive(Debug, Default)]
struct LevelBuilder {
    scale: u32,
    width_px: Option<u64>,
    height_px: Option<u64>,
    um_per_pixel_x: f64,
    um_per_pixel_y: f64,
}

#[derive(Debug, Default)]
struct WsiBuilder {
    block_width: u32,
    block_height: u32,
    header_templates: Vec<HeaderTemplate>,
    levels: Vec<LevelBuilder>,
    block_header_table: Option<Vec<u8>>,
    mpp_x: Option<f64>,
    mpp_y: Option<f64>,
    icc_profile: Option<IccMetadata>,
}

#[derive(Debug, Default)]
struct Driver {
    stack: Vec<ParserFrame>,
    pending_attr: Option<String>,
    content: Vec<u8>,
    wsi: WsiBuilder,
    current_image_kind: Option<&'static str>,
    label_jpeg: Option<Vec<u8>>,
    macro_jpeg: Option<Vec<u8>>,
    current_level: Option<LevelBuilder>,
    current_level_scale: Option<u32>,
    dimension_axis: u8,
}

/// Tags whose content is large enough to warrant the tokeniser's bulk-copy fast path.
fn is_large_payload_tag(group: u16, element: u16) -> bool {
    (group, element) == boxes::BLOCK_HEADER_TABLE
        || (group, element) == boxes::SCANNED_IMAGE
        || (group, element) == boxes::ICC_PROFILE
}

impl Driver {
    fn handle_attr_end(&mut self, tok: &mut Tokenizer) {
        self.pending_attr = None;
        let Some(frame) = self.stack.last_mut() else {
            return;
        };
        if let (Some(g), Some(e)) = (frame.group, frame.element) {
            if is_large_payload_tag(g, e) && !frame.raw_content_active {
                frame.raw_content_active = true;
                tok.raw_content = true;
            }
        }
    }

    fn element_start(&mut self, name: String) -> Result<()> {
        if self.stack.is_empty() && name != boxes::ROOT_ELEMENT {
            bail!(FormatError::UnexpectedRoot);
        }
        self.content.clear();
        self.stack.push(ParserFrame {
            tag: name,
            ..Default::default()
        });
        Ok(())
    }

    fn attr_start(&mut self, name: String) {
        self.pending_attr = Some(name);
    }

    fn attr_val(&mut self, value: Vec<u8>) -> Result<()> {
        let Some(attr) = self.pending_attr.clone() else {
            return Ok(());
        };
        let is_root = self.stack.len() == 1;
        let Some(frame) = self.stack.last_mut() else {
            return Ok(());
        };
        let text = String::from_utf8_lossy(&value).into_owned();
        match attr.as_str() {
            "Name" => frame.name = Some(text),
            "Group" => frame.group = parse_hex_u16(&value),
            "Element" => frame.element = parse_hex_u16(&value),
            "ObjectType" => {
                frame.object_type = Some(ObjectTypeTag::from_str(&text));
                if is_root && frame.tag == boxes::ROOT_ELEMENT && text != boxes::ROOT_OBJECT_TYPE {
                    bail!(FormatError::UnexpectedRoot);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn content_bytes(&mut self, bytes: Vec<u8>) {
        self.content.extend_from_slice(&bytes);
    }

    fn element_end(&mut self, tok: &mut Tokenizer) -> Result<()> {
        let Some(frame) = self.stack.pop() else {
            return Ok(());
        };
        if frame.raw_content_active {
            tok.raw_content = false;
        }
        if frame.tag != "Attribute" {
            self.content.clear();
            return Ok(());
        }
        if let (Some(g), Some(e)) = (frame.group, frame.element) {
            self.dispatch_attribute((g, e), &std::mem::take(&mut self.content))?;
        }
        self.content.clear();
        Ok(())
    }

    fn dispatch_attribute(&mut self, tag: Tag, content: &[u8]) -> Result<()> {
        let text = || String::from_utf8_lossy(content).trim().to_string();
        match tag {
            boxes::IMAGE_TYPE => {
                self.current_image_kind = Some(match text().as_str() {
                    "WSI" => "WSI",
                    "LABELIMAGE" => "LABEL",
                    "MACROIMAGE" => "MACRO",
                    _ => "WSI",
                });
            }
            boxes::PIXEL_SPACING => {
                let parts: Vec<f64> = text()
                    .split(['\\', ' ', ','])
                    .filter_map(|p| p.trim().parse().ok())
                    .collect();
                if parts.len() >= 2 {
                    self.wsi.mpp_y = Some(parts[0]);
                    self.wsi.mpp_x = Some(parts[1]);
                }
            }
            boxes::BLOCK_WIDTH => {
                self.wsi.block_width = text().parse().unwrap_or(0);
            }
            boxes::BLOCK_HEIGHT => {
                self.wsi.block_height = text().parse().unwrap_or(0);
            }
            boxes::PIXEL_DATA_REPRESENTATION_NUMBER => {
                let scale: u32 = text().parse().unwrap_or(0);
                self.current_level_scale = Some(scale);
                if let Some(level) = self.current_level.as_mut() {
                    level.scale = scale;
                }
            }
            boxes::DIMENSION_RANGE => {
                // Whitespace/backslash-separated `{origin, increment, size}` triple;
                // only `size` (the last field) is needed to derive the tile grid.
                let parts: Vec<f64> = text()
                    .split(['\\', ' '])
                    .filter_map(|p| p.trim().parse().ok())
                    .collect();
                let size = parts.last().copied().unwrap_or(0.0).max(0.0) as u64;
                let increment = parts.get(1).copied().unwrap_or(1.0);
                let level = self.current_level.get_or_insert_with(LevelBuilder::default);
                if level.width_px.is_none() {
                    level.width_px = Some(size);
                    level.um_per_pixel_x = increment;
                } else {
                    level.height_px = Some(size);
                    level.um_per_pixel_y = increment;
                }
            }
            boxes::BLOCK_HEADER_TABLE => {
                self.wsi.block_header_table = Some(decode_base64(content)?);
            }
            boxes::SCANNED_IMAGE => {
                let jpeg = decode_base64(content)?;
                match self.current_image_kind {
                    Some("LABEL") => self.label_jpeg = Some(jpeg),
                    Some("MACRO") => self.macro_jpeg = Some(jpeg),
                    _ => {}
                }
            }
            boxes::ICC_PROFILE => {
                self.wsi.icc_profile = IccMetadata::from_data(content);
            }
            _ => {}
        }
        Ok(())
    }

    fn finish_level_if_pending(&mut self) {
        if let Some(level) = self.current_level.take() {
            self.wsi.levels.push(level);
        }
    }
}

fn decode_base64(content: &[u8]) -> Result<Vec<u8>> {
    use base64::Engine;
    let cleaned: Vec<u8> = content.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(cleaned)
        .map_err(|_| err!(FormatError::BadBase64))
}

/// Parses the full container: XML header, block-header table, and binary seektable.
pub fn parse(reader: &dyn PositionalReader) -> Result<ParsedContainer> {
    let mut driver = Driver::default();
    let mut tok = Tokenizer::new();
    let mut events = Vec::new();

    let mut offset: u64 = 0;
    let total = reader.len();
    let mut header_end: Option<u64> = None;

    while offset < total {
        let remaining = (total - offset).min(CHUNK_SIZE as u64) as usize;
        let chunk = reader.read_at(offset, remaining)?;
        let terminator_pos = chunk.iter().position(|&b| b == boxes::XML_TERMINATOR);
        let xml_part = match terminator_pos {
            Some(pos) => &chunk[..pos],
            None => &chunk[..],
        };
        events.clear();
        tok.feed(xml_part, &mut events)?;
        for event in events.drain(..) {
            apply_event(&mut driver, &mut tok, event)?;
        }
        if let Some(pos) = terminator_pos {
            header_end = Some(offset + pos as u64);
            break;
        }
        offset += remaining as u64;
    }
    let header_end = header_end.ok_or(FormatError::MissingXmlTerminator)?;
    driver.finish_level_if_pending();

    let seektable = read_seektable(reader, header_end + 1)?;
    let mut codeblocks = build_codeblock_table(&driver.wsi)?;
    assign_block_ids_and_offsets(&driver.wsi, &mut codeblocks, &seektable);
    let data_chunks = build_data_chunks(&codeblocks);
    let levels = build_levels(&driver.wsi, &codeblocks, driver.wsi.block_width, driver.wsi.block_height);

    let mut images = vec![Image {
        kind: ImageKind::Wsi {
            levels,
            codeblocks,
            data_chunks,
            header_templates: driver.wsi.header_templates.clone(),
        },
        origin_x: 0,
        origin_y: 0,
    }];
    if let Some(jpeg) = driver.label_jpeg {
        images.push(Image {
            kind: ImageKind::Label { jpeg },
            origin_x: 0,
            origin_y: 0,
        });
    }
    if let Some(jpeg) = driver.macro_jpeg {
        images.push(Image {
            kind: ImageKind::Macro { jpeg },
            origin_x: 0,
            origin_y: 0,
        });
    }

    let icc_color_space = driver.wsi.icc_profile.as_ref().map(|icc| icc.color_space.name());
    let icc_channels = driver
        .wsi
        .icc_profile
        .as_ref()
        .map(|icc| icc.color_space.num_components());

    Ok(ParsedContainer {
        images,
        block_width: driver.wsi.block_width,
        block_height: driver.wsi.block_height,
        mpp_x: driver.wsi.mpp_x,
        mpp_y: driver.wsi.mpp_y,
        icc_color_space,
        icc_channels,
    })
}

fn apply_event(driver: &mut Driver, tok: &mut Tokenizer, event: Event) -> Result<()> {
    match event {
        Event::ElementStart { name } => {
            if name == "PixelDataRepresentation" {
                driver.current_level = Some(LevelBuilder::default());
            }
            driver.element_start(name)?;
        }
        Event::AttrStart { name } => driver.attr_start(name),
        Event::AttrVal { value } => driver.attr_val(value)?,
        Event::AttrEnd => driver.handle_attr_end(tok),
        Event::Content { bytes } => driver.content_bytes(bytes),
        Event::ElementEnd => {
            let tag_was_pixel_rep = driver
                .stack
                .last()
                .map(|f| f.tag == "PixelDataRepresentation")
                .unwrap_or(false);
            driver.element_end(tok)?;
            if tag_was_pixel_rep {
                driver.finish_level_if_pending();
            }
        }
    }
    Ok(())
}

/// One raw seektable entry (§6).
#[derive(Debug, Clone, Copy, Default)]
struct SeekEntry {
    offset: u64,
    size: u32,
}

fn read_seektable(reader: &dyn PositionalReader, start: u64) -> Result<Vec<SeekEntry>> {
    if start >= reader.len() {
        return Ok(Vec::new());
    }
    let header = reader.read_at(start, 10)?;
    let mut r = Reader::new(&header);
    let group = r.read_u16().unwrap_or(0);
    let element = r.read_u16().unwrap_or(0);
    let _reserved = r.read_u16();
    let size = r.read_u32().unwrap_or(0);
    if (group, element) != boxes::SEEKTABLE_SEQUENCE {
        bail!(FormatError::UnexpectedDicomTag { group, element });
    }
    let body = reader.read_at(start + 10, size as usize)?;
    let count = body.len() / SEEKTABLE_ENTRY_STRIDE;
    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let rec = &body[i * SEEKTABLE_ENTRY_STRIDE..][..SEEKTABLE_ENTRY_STRIDE];
        let mut rr = Reader::new(rec);
        let entry_group = rr.read_u16().unwrap_or(0);
        let entry_element = rr.read_u16().unwrap_or(0);
        if (entry_group, entry_element) != boxes::SEEKTABLE_ENTRY {
            bail!(FormatError::UnexpectedDicomTag {
                group: entry_group,
                element: entry_element,
            });
        }
        rr.skip_bytes(8); // reserved + per-entry length, not needed once the stride is fixed
        let offset = rr.read_u64().unwrap_or(0);
        let size = rr.read_u32().unwrap_or(0);
        entries.push(SeekEntry { offset, size });
    }
    Ok(entries)
}

/// Size (in bytes) a partial record's DICOM sequence-element header declares in its
/// `size` field (the record proper is 40 bytes, stride 48 once the 8-byte header is
/// counted).
const PARTIAL_RECORD_SIZE: u32 = 40;
/// See [`PARTIAL_RECORD_SIZE`]; the full-record equivalent (72 bytes, stride 80).
const FULL_RECORD_SIZE: u32 = 72;

fn build_codeblock_table(wsi: &WsiBuilder) -> Result<Vec<Codeblock>> {
    let Some(table) = wsi.block_header_table.as_ref() else {
        return Ok(Vec::new());
    };
    if table.len() < 4 {
        return Ok(Vec::new());
    }
    let mut r = Reader::new(table);
    let payload_size = r.read_u32().unwrap_or(0) as usize;
    let body = r.read_bytes(payload_size.min(table.len().saturating_sub(4))).unwrap_or(&[]);
    if body.is_empty() {
        return Ok(Vec::new());
    }

    // Every record opens with an 8-byte DICOM sequence-element header
    // `{group: u16, element: u16, size: u32}`; `size` is 40 for a partial record
    // (offset/size live in the seektable, stride 48) or 72 for a full record
    // (offset/size stored inline, stride 80) — isyntax.c:399-455. The table is one
    // or the other throughout a file, so the first record's size picks the stride
    // for the whole table.
    if body.len() < 8 {
        bail!(FormatError::BadBlockHeaderStride(body.len()));
    }
    let mut probe = Reader::new(body);
    probe.skip_bytes(4);
    let record_size = probe.read_u32().unwrap_or(0);
    let stride = match record_size {
        PARTIAL_RECORD_SIZE => PARTIAL_STRIDE,
        FULL_RECORD_SIZE => FULL_STRIDE,
        _ => bail!(FormatError::BadBlockHeaderStride(record_size as usize)),
    };
    if body.len() % stride != 0 {
        bail!(FormatError::BadBlockHeaderStride(body.len()));
    }

    let mut codeblocks = Vec::new();
    let mut rr = Reader::new(body);
    let mut offset = 0usize;
    while offset + stride <= body.len() {
        rr.seek(offset);
        let _seq_header = rr.read_bytes(8);
        let x = rr.read_u32().unwrap_or(0);
        let y = rr.read_u32().unwrap_or(0);
        let color_component = rr.read_u32().unwrap_or(0) as u8;
        let scale = rr.read_u32().unwrap_or(0);
        let coefficient_raw = rr.read_u32().unwrap_or(0);
        let block_header_template_id = rr.read_u32().unwrap_or(0);
        let coefficient = if coefficient_raw == 0 {
            Coefficient::Ll
        } else {
            Coefficient::H
        };
        let (block_data_offset, block_size) = if stride == FULL_STRIDE {
            let off = rr.read_u64().unwrap_or(0);
            let sz = rr.read_u32().unwrap_or(0);
            (off, sz)
        } else {
            (0, 0)
        };
        codeblocks.push(Codeblock {
            x,
            y,
            color_component,
            scale,
            coefficient,
            block_data_offset,
            block_size,
            block_header_template_id,
            block_id: 0,
        });
        offset += stride;
    }
    Ok(codeblocks)
}

/// Computes each codeblock's `block_id` (§4.5) from its (colour, scale, x, y) and
/// looks up its offset/size in the parsed seektable.
fn assign_block_ids_and_offsets(wsi: &WsiBuilder, codeblocks: &mut [Codeblock], seektable: &[SeekEntry]) {
    let bw = wsi.block_width.max(1);
    let bh = wsi.block_height.max(1);

    // Tile counts per scale, finest (0) first, derived from the dimension ranges.
    let tiles_per_scale: Vec<u64> = wsi
        .levels
        .iter()
        .map(|l| {
            let w = l.width_px.unwrap_or(0).div_ceil(bw as u64);
            let h = l.height_px.unwrap_or(0).div_ceil(bh as u64);
            w * h
        })
        .collect();
    // H codeblocks exist at every scale; LL codeblocks exist only at the top
    // (coarsest) scale, so the block-id space reserves one extra swath of ids
    // the size of that scale's own tile grid (isyntax.c:2423,2458).
    let h_coeff_tile_count: u64 = tiles_per_scale.iter().sum();
    let ll_coeff_tile_count: u64 = tiles_per_scale.last().copied().unwrap_or(0);
    let total_coeff_tile_count = h_coeff_tile_count + ll_coeff_tile_count;

    for block in codeblocks.iter_mut() {
        let is_ll = matches!(block.coefficient, Coefficient::Ll);
        // An LL block's id sits after every H block through and including its own
        // scale; an H block's id only sits after the finer scales.
        let maxscale = if is_ll { block.scale + 1 } else { block.scale };
        let finer_tiles: u64 = tiles_per_scale.iter().take(maxscale as usize).sum();
        let level_width_tiles = wsi
            .levels
            .get(block.scale as usize)
            .and_then(|l| l.width_px)
            .unwrap_or(0)
            .div_ceil(bw as u64)
            .max(1);
        let bx = (block.x as u64) / bw as u64;
        let by = (block.y as u64) / bh as u64;
        let intra_index = by * level_width_tiles + bx;
        let block_id = finer_tiles + intra_index + (block.color_component as u64) * total_coeff_tile_count;
        block.block_id = block_id as u32;
        // Full records already carry their offset/size inline; only partial
        // records (both still zero at this point) resolve through the seektable.
        if block.block_data_offset == 0 && block.block_size == 0 {
            if let Some(entry) = seektable.get(block_id as usize) {
                block.block_data_offset = entry.offset;
                block.block_size = entry.size;
            }
        }
    }
}

fn build_data_chunks(codeblocks: &[Codeblock]) -> Vec<DataChunk> {
    // A simplified but order-preserving grouping: one chunk per distinct top scale
    // run of codeblocks sharing (scale, colour-cycle position), sized by how many
    // codeblocks share that offset bracket. Real iSyntax files interleave three
    // stacked levels (1+4+16) per chunk; we approximate that by chunking on
    // contiguous same-top-scale runs, which preserves the offset/size/owner
    // relationship the resolver and cache actually depend on.
    let mut chunks = Vec::new();
    if codeblocks.is_empty() {
        return chunks;
    }
    let mut i = 0;
    while i < codeblocks.len() {
        let top_scale = codeblocks[i].scale;
        let start = i;
        while i < codeblocks.len() && codeblocks[i].scale == top_scale {
            i += 1;
        }
        let count = (i - start) as u32;
        let per_colour = (count / NUM_COLOURS as u32).max(1);
        chunks.push(DataChunk {
            offset: codeblocks[start].block_data_offset,
            top_scale,
            top_codeblock_index: start as u32,
            codeblocks_per_colour: per_colour,
        });
    }
    chunks
}

fn build_levels(wsi: &WsiBuilder, codeblocks: &[Codeblock], bw: u32, bh: u32) -> Vec<Level> {
    let bw = bw.max(1);
    let bh = bh.max(1);
    let mut levels = Vec::new();
    for (scale, lvl) in wsi.levels.iter().enumerate() {
        let scale = scale as u32;
        let width_in_tiles = lvl.width_px.unwrap_or(0).div_ceil(bw as u64).max(1) as u32;
        let height_in_tiles = lvl.height_px.unwrap_or(0).div_ceil(bh as u64).max(1) as u32;
        let mut tiles = Vec::with_capacity((width_in_tiles * height_in_tiles) as usize);
        for ty in 0..height_in_tiles {
            for tx in 0..width_in_tiles {
                tiles.push(Tile::absent(crate::model::TileId::new(scale, tx, ty)));
            }
        }
        levels.push(Level {
            scale,
            width_in_tiles,
            height_in_tiles,
            downsample_factor: 1 << scale,
            um_per_pixel_x: lvl.um_per_pixel_x,
            um_per_pixel_y: lvl.um_per_pixel_y,
            tiles,
        });
    }
    // Mark existence and owning codeblock index from the parsed table (I2).
    for (idx, block) in codeblocks.iter().enumerate() {
        if let Some(level) = levels.iter_mut().find(|l| l.scale == block.scale) {
            let bx = block.x / bw;
            let by = block.y / bh;
            if let Some(tile) = level.tile_mut(bx, by) {
                if block.block_data_offset != 0 || block.block_size != 0 {
                    tile.exists = true;
                    tile.codeblock_index = Some(idx as u32);
                }
            }
        }
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;

    fn xml_fixture() -> Vec<u8> {
        let mut xml = String::new();
        xml.push_str(r#"<DataObject ObjectType="DPUfsImport">"#);
        xml.push_str(r#"<Attribute Name="PIM_DP_IMAGE_TYPE" Group="0x301D" Element="0x1004" PMSVR="IString">WSI</Attribute>"#);
        xml.push_str(r#"<Attribute Name="Block Width" Group="0x301D" Element="0x2010" PMSVR="IUInt16">4</Attribute>"#);
        xml.push_str(r#"<Attribute Name="Block Height" Group="0x301D" Element="0x2011" PMSVR="IUInt16">4</Attribute>"#);
        xml.push_str(r#"<DataObject ObjectType="PixelDataRepresentation">"#);
        xml.push_str(r#"<Attribute Name="Scale" Group="0x301D" Element="0x1007" PMSVR="IUInt16">0</Attribute>"#);
        xml.push_str(r#"<Attribute Name="DimX" Group="0x301D" Element="0x1012" PMSVR="IString">0\1\8</Attribute>"#);
        xml.push_str(r#"<Attribute Name="DimY" Group="0x301D" Element="0x1012" PMSVR="IString">0\1\8</Attribute>"#);
        xml.push_str("</DataObject>");
        xml.push_str("</DataObject>");
        let mut bytes = xml.into_bytes();
        bytes.push(boxes::XML_TERMINATOR);
        bytes
    }

    #[test]
    fn parses_block_dimensions_and_image_type() {
        let reader = MemoryReader::new(xml_fixture());
        let parsed = parse(&reader).unwrap();
        assert_eq!(parsed.block_width, 4);
        assert_eq!(parsed.block_height, 4);
        assert!(matches!(parsed.images[0].kind, ImageKind::Wsi { .. }));
    }

    #[test]
    fn missing_terminator_is_an_error() {
        let reader = MemoryReader::new(b"<DataObject ObjectType=\"DPUfsImport\"></DataObject>".to_vec());
        assert!(parse(&reader).is_err());
    }

    fn push_record_header(buf: &mut Vec<u8>, record_size: u32) {
        buf.extend_from_slice(&0x301Du16.to_le_bytes());
        buf.extend_from_slice(&0x2020u16.to_le_bytes());
        buf.extend_from_slice(&record_size.to_le_bytes());
    }

    #[allow(clippy::too_many_arguments)]
    fn push_partial_record(buf: &mut Vec<u8>, x: u32, y: u32, color: u32, scale: u32, coefficient: u32, template_id: u32) {
        let start = buf.len();
        push_record_header(buf, PARTIAL_RECORD_SIZE);
        buf.extend_from_slice(&x.to_le_bytes());
        buf.extend_from_slice(&y.to_le_bytes());
        buf.extend_from_slice(&color.to_le_bytes());
        buf.extend_from_slice(&scale.to_le_bytes());
        buf.extend_from_slice(&coefficient.to_le_bytes());
        buf.extend_from_slice(&template_id.to_le_bytes());
        buf.resize(start + PARTIAL_STRIDE, 0);
    }

    #[allow(clippy::too_many_arguments)]
    fn push_full_record(
        buf: &mut Vec<u8>,
        x: u32,
        y: u32,
        color: u32,
        scale: u32,
        coefficient: u32,
        template_id: u32,
        block_data_offset: u64,
        block_size: u32,
    ) {
        let start = buf.len();
        push_record_header(buf, FULL_RECORD_SIZE);
        buf.extend_from_slice(&x.to_le_bytes());
        buf.extend_from_slice(&y.to_le_bytes());
        buf.extend_from_slice(&color.to_le_bytes());
        buf.extend_from_slice(&scale.to_le_bytes());
        buf.extend_from_slice(&coefficient.to_le_bytes());
        buf.extend_from_slice(&template_id.to_le_bytes());
        buf.extend_from_slice(&block_data_offset.to_le_bytes());
        buf.extend_from_slice(&block_size.to_le_bytes());
        buf.resize(start + FULL_STRIDE, 0);
    }

    fn table_with_body(body: Vec<u8>) -> Vec<u8> {
        let mut table = Vec::with_capacity(4 + body.len());
        table.extend_from_slice(&(body.len() as u32).to_le_bytes());
        table.extend_from_slice(&body);
        table
    }

    fn two_scale_wsi(table: Vec<u8>) -> WsiBuilder {
        WsiBuilder {
            block_width: 4,
            block_height: 4,
            levels: vec![
                LevelBuilder { scale: 0, width_px: Some(8), height_px: Some(8), um_per_pixel_x: 1.0, um_per_pixel_y: 1.0 },
                LevelBuilder { scale: 1, width_px: Some(4), height_px: Some(4), um_per_pixel_x: 1.0, um_per_pixel_y: 1.0 },
            ],
            block_header_table: Some(table),
            ..Default::default()
        }
    }

    /// Two scales (0: 2x2 tiles, 1: 1x1 tile, the top of the pyramid) each carrying an
    /// H codeblock at scale 1, plus the top scale's LL codeblock, for two colours.
    /// Before the `maxscale = is_ll ? scale + 1 : scale` fix, the LL and H codeblocks
    /// at the same (colour, scale, x, y) collided on the same `block_id`.
    #[test]
    fn ll_and_h_codeblocks_at_top_scale_get_distinct_block_ids() {
        let mut body = Vec::new();
        push_partial_record(&mut body, 0, 0, 0, 1, 1, 0); // H,  scale 1, colour 0
        push_partial_record(&mut body, 0, 0, 0, 1, 0, 0); // LL, scale 1, colour 0
        push_partial_record(&mut body, 0, 0, 1, 1, 1, 0); // H,  scale 1, colour 1
        push_partial_record(&mut body, 0, 0, 1, 1, 0, 0); // LL, scale 1, colour 1
        let wsi = two_scale_wsi(table_with_body(body));

        let mut codeblocks = build_codeblock_table(&wsi).unwrap();
        assert_eq!(codeblocks.len(), 4);
        assign_block_ids_and_offsets(&wsi, &mut codeblocks, &[]);

        let find = |colour: u8, ll: bool| {
            codeblocks
                .iter()
                .find(|c| c.color_component == colour && matches!(c.coefficient, Coefficient::Ll) == ll)
                .unwrap()
        };
        let h0 = find(0, false);
        let ll0 = find(0, true);
        let h1 = find(1, false);
        let ll1 = find(1, true);

        // tiles_per_scale = [4, 1]; h_coeff_tile_count = 5, ll_coeff_tile_count = 1,
        // total_coeff_tile_count = 6.
        assert_ne!(h0.block_id, ll0.block_id);
        assert_eq!(h0.block_id, 4);
        assert_eq!(ll0.block_id, 5);
        assert_eq!(h1.block_id, 10);
        assert_eq!(ll1.block_id, 11);
    }

    #[test]
    fn full_stride_record_populates_offset_and_size_inline() {
        let mut body = Vec::new();
        push_full_record(&mut body, 0, 0, 0, 0, 1, 0, 0x1234_5678, 999);
        let wsi = two_scale_wsi(table_with_body(body));

        let mut codeblocks = build_codeblock_table(&wsi).unwrap();
        assert_eq!(codeblocks.len(), 1);
        assert_eq!(codeblocks[0].block_data_offset, 0x1234_5678);
        assert_eq!(codeblocks[0].block_size, 999);

        // An empty seektable must not overwrite a full record's inline offset/size.
        assign_block_ids_and_offsets(&wsi, &mut codeblocks, &[]);
        assert_eq!(codeblocks[0].block_data_offset, 0x1234_5678);
        assert_eq!(codeblocks[0].block_size, 999);
    }

    #[test]
    fn unrecognised_record_size_is_a_format_error() {
        let mut body = Vec::new();
        push_record_header(&mut body, 13);
        body.resize(PARTIAL_STRIDE, 0);
        let wsi = two_scale_wsi(table_with_body(body));
        assert!(build_codeblock_table(&wsi).is_err());
    }

    #[test]
    fn table_length_not_a_multiple_of_stride_is_a_format_error() {
        let mut body = Vec::new();
        push_partial_record(&mut body, 0, 0, 0, 0, 1, 0);
        body.push(0); // one byte past a whole number of 48-byte records
        let wsi = two_scale_wsi(table_with_body(body));
        assert!(build_codeblock_table(&wsi).is_err());
    }
}
