use crate::config::service_config::StampBounds;
use crate::core::stamp::StampPlacer;
use crate::domain::model::{FetchedResource, ImageFormat, StampPlacement};
use crate::utils::error::{DocError, Result};
use image::ImageDecoder;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::Cursor;

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Content type first; when it names neither format, sniff for the PNG signature.
pub fn detect_format(content_type: Option<&str>, bytes: &[u8]) -> ImageFormat {
    let declared = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    match declared.as_deref() {
        Some("image/png") => ImageFormat::Png,
        Some("image/jpeg" | "image/jpg" | "image/pjpeg") => ImageFormat::Jpeg,
        _ if bytes.starts_with(PNG_SIGNATURE) => ImageFormat::Png,
        _ => ImageFormat::Jpeg,
    }
}

struct EmbeddedImage {
    id: ObjectId,
    width: u32,
    height: u32,
}

/// Draws `image` onto the first page of `pdf`.
pub fn stamp_first_page(
    pdf: &[u8],
    image: &FetchedResource,
    bounds: StampBounds,
) -> Result<(Vec<u8>, StampPlacement)> {
    let mut doc = Document::load_mem(pdf)
        .map_err(|e| DocError::input(format!("not a valid PDF: {}", e)))?;

    let page_id = *doc
        .get_pages()
        .get(&1)
        .ok_or_else(|| DocError::input("PDF has no pages"))?;
    let (llx, lly, urx, ury) = media_box(&doc, page_id)
        .ok_or_else(|| DocError::input("first page has no MediaBox"))?;

    let format = detect_format(image.content_type.as_deref(), &image.bytes);
    let embedded = match format {
        ImageFormat::Png => embed_png(&mut doc, &image.bytes)?,
        ImageFormat::Jpeg => embed_jpeg(&mut doc, &image.bytes)?,
    };

    let placement = StampPlacer::new(bounds).place(
        urx - llx,
        ury - lly,
        f64::from(embedded.width),
        f64::from(embedded.height),
    )?;

    let name = register_xobject(&mut doc, page_id, embedded.id)?;
    let draw = format!(
        "q\n{:.4} 0 0 {:.4} {:.4} {:.4} cm\n/{} Do\nQ\n",
        placement.draw_width,
        placement.draw_height,
        llx + placement.x,
        lly + placement.y,
        name
    );
    append_content(&mut doc, page_id, draw.into_bytes())?;

    tracing::info!(
        ?format,
        x = placement.x,
        y = placement.y,
        width = placement.draw_width,
        height = placement.draw_height,
        "🔏 Stamped first page"
    );

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok((out, placement))
}

fn embed_png(doc: &mut Document, bytes: &[u8]) -> Result<EmbeddedImage> {
    let rgba = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)?.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let mut image_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };

    if alpha.iter().any(|&a| a != u8::MAX) {
        let smask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            miniz_oxide::deflate::compress_to_vec_zlib(&alpha, 6),
        );
        image_dict.set("SMask", doc.add_object(smask));
    }

    let stream = Stream::new(image_dict, miniz_oxide::deflate::compress_to_vec_zlib(&rgb, 6));
    Ok(EmbeddedImage {
        id: doc.add_object(stream),
        width,
        height,
    })
}

/// JPEG data goes in untouched; only the header is read for size and colour space.
fn embed_jpeg(doc: &mut Document, bytes: &[u8]) -> Result<EmbeddedImage> {
    let frame = match read_jpeg_frame(bytes) {
        Some(frame) => frame,
        None => {
            // no frame header found; the decoder reports what is wrong
            let decoder = image::codecs::jpeg::JpegDecoder::new(Cursor::new(bytes))?;
            let (width, height) = decoder.dimensions();
            JpegFrame {
                width,
                height,
                components: decoder.color_type().channel_count(),
                adobe: false,
            }
        }
    };

    let color_space = match frame.components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        4 => "DeviceCMYK",
        n => {
            return Err(DocError::input(format!(
                "unsupported JPEG with {} colour components",
                n
            )))
        }
    };

    let mut image_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => frame.width as i64,
        "Height" => frame.height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
        "Filter" => "DCTDecode",
    };
    // Adobe writes CMYK JPEGs inverted
    if frame.components == 4 && frame.adobe {
        let decode: Vec<Object> = [1, 0, 1, 0, 1, 0, 1, 0]
            .into_iter()
            .map(Object::Integer)
            .collect();
        image_dict.set("Decode", decode);
    }

    let stream = Stream::new(image_dict, bytes.to_vec());
    Ok(EmbeddedImage {
        id: doc.add_object(stream),
        width: frame.width,
        height: frame.height,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegFrame {
    width: u32,
    height: u32,
    components: u8,
    /// An Adobe APP14 segment precedes the frame.
    adobe: bool,
}

/// Walks the marker segments up to the first start-of-frame.
fn read_jpeg_frame(bytes: &[u8]) -> Option<JpegFrame> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }

    let mut adobe = false;
    let mut i = 2;
    while i + 4 <= bytes.len() {
        if bytes[i] != 0xFF {
            return None;
        }
        let marker = bytes[i + 1];
        match marker {
            0xFF => {
                i += 1;
                continue;
            }
            0x01 | 0xD0..=0xD7 => {
                i += 2;
                continue;
            }
            0xD9 | 0xDA => return None,
            _ => {}
        }

        let len = usize::from(u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]));
        if len < 2 {
            return None;
        }
        let body = bytes.get(i + 4..i + 2 + len)?;
        match marker {
            0xEE if body.starts_with(b"Adobe") => adobe = true,
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                if body.len() < 6 {
                    return None;
                }
                return Some(JpegFrame {
                    height: u32::from(u16::from_be_bytes([body[1], body[2]])),
                    width: u32::from(u16::from_be_bytes([body[3], body[4]])),
                    components: body[5],
                    adobe,
                });
            }
            _ => {}
        }
        i += 2 + len;
    }
    None
}

/// Adds the image to the page's XObject resources under a fresh name.
/// Inherited or shared resources are copied onto the page first.
fn register_xobject(doc: &mut Document, page_id: ObjectId, image_id: ObjectId) -> Result<String> {
    let mut resources = effective_resources(doc, page_id).unwrap_or_else(Dictionary::new);

    let mut xobjects = match resources.get(b"XObject") {
        Ok(obj) => resolve_dict(doc, obj).unwrap_or_else(Dictionary::new),
        Err(_) => Dictionary::new(),
    };

    let mut name = "ImStamp".to_string();
    let mut n = 1;
    while xobjects.has(name.as_bytes()) {
        name = format!("ImStamp{}", n);
        n += 1;
    }
    xobjects.set(name.clone(), Object::Reference(image_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Resources", Object::Dictionary(resources));
    Ok(name)
}

/// Keeps the existing drawing inside `q`/`Q` so its graphics state cannot leak
/// into the stamp, then appends `content`.
fn append_content(doc: &mut Document, page_id: ObjectId, content: Vec<u8>) -> Result<()> {
    let existing: Vec<Object> = {
        let page = doc.get_object(page_id)?.as_dict()?;
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    };

    let mut contents = Vec::with_capacity(existing.len() + 3);
    if !existing.is_empty() {
        let open = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let close = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
        contents.push(Object::Reference(open));
        contents.extend(existing);
        contents.push(Object::Reference(close));
    }
    let stamp = doc.add_object(Stream::new(Dictionary::new(), content));
    contents.push(Object::Reference(stamp));

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Contents", Object::Array(contents));
    Ok(())
}

/// Walks the `Parent` chain for an inheritable page attribute.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_object(page_id).ok()?.as_dict().ok()?;
    loop {
        if let Ok(obj) = current.get(key) {
            return Some(obj);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_object(parent).ok()?.as_dict().ok()?;
    }
}

fn effective_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    resolve_dict(doc, inherited(doc, page_id, b"Resources")?)
}

fn resolve_dict(doc: &Document, obj: &Object) -> Option<Dictionary> {
    match obj {
        Object::Dictionary(d) => Some(d.clone()),
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok().cloned(),
        _ => None,
    }
}

fn media_box(doc: &Document, page_id: ObjectId) -> Option<(f64, f64, f64, f64)> {
    let raw = inherited(doc, page_id, b"MediaBox")?;
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let arr = resolved.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let (a, b, c, d) = (
        obj_to_f64(&arr[0])?,
        obj_to_f64(&arr[1])?,
        obj_to_f64(&arr[2])?,
        obj_to_f64(&arr[3])?,
    );
    // normalise boxes written with swapped corners
    Some((a.min(c), b.min(d), a.max(c), b.max(d)))
}

fn obj_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some((*f).into()),
        _ => None,
    }
}
