use crate::error::RenderError;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

const IMAGE_NAME: &str = "Im0";

/// 将栅格嵌入单页 PDF，页面尺寸与逻辑画布一一对应
pub fn paginate(raster: &RgbImage, page_width: u32, page_height: u32) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(raster.width() as i64),
            "Height" => Object::Integer(raster.height() as i64),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => Object::Integer(8),
        },
        raster.as_raw().clone(),
    );
    let image_id = doc.add_object(image);

    // 图像空间是单位正方形，用 cm 拉伸到整页
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(page_width as i64),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(page_height as i64),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|err| RenderError::Pagination(err.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! {
            IMAGE_NAME => image_id,
        },
    });
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(page_width as i64),
            Object::Integer(page_height as i64),
        ],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|err| RenderError::Pagination(err.to_string()))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use image::Rgb;
    use std::io::Read;

    /// 图像流按 /Filter 解压；lopdf 不解压图像流
    fn image_bytes(stream: &Stream) -> Vec<u8> {
        let flate = stream
            .dict
            .get(b"Filter")
            .and_then(|filter| filter.as_name())
            .map(|name| name == b"FlateDecode")
            .unwrap_or(false);
        if !flate {
            return stream.content.clone();
        }
        let mut data = Vec::new();
        ZlibDecoder::new(stream.content.as_slice())
            .read_to_end(&mut data)
            .unwrap();
        data
    }

    fn integers(object: &Object) -> Vec<i64> {
        object
            .as_array()
            .unwrap()
            .iter()
            .map(|value| value.as_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_single_page_with_exact_media_box() {
        let raster = RgbImage::from_pixel(16, 8, Rgb([10, 20, 30]));
        let bytes = paginate(&raster, 842, 595).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);

        let page_id = *pages.values().next().unwrap();
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        assert_eq!(integers(page.get(b"MediaBox").unwrap()), vec![0, 0, 842, 595]);
    }

    #[test]
    fn test_raster_embedded_as_rgb_image() {
        let raster = RgbImage::from_pixel(16, 8, Rgb([10, 20, 30]));
        let bytes = paginate(&raster, 842, 595).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();

        let image = doc
            .objects
            .values()
            .filter_map(|object| object.as_stream().ok())
            .find(|stream| {
                stream
                    .dict
                    .get(b"Subtype")
                    .and_then(|subtype| subtype.as_name())
                    .map(|name| name == b"Image")
                    .unwrap_or(false)
            })
            .unwrap();
        assert_eq!(image.dict.get(b"Width").unwrap().as_i64().unwrap(), 16);
        assert_eq!(image.dict.get(b"Height").unwrap().as_i64().unwrap(), 8);

        assert_eq!(
            image.dict.get(b"Filter").unwrap().as_name().unwrap(),
            b"FlateDecode"
        );
        let data = image_bytes(image);
        assert_eq!(data.len(), 16 * 8 * 3);
        assert_eq!(&data[..3], &[10, 20, 30]);
    }
}
