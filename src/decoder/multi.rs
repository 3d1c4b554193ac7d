use image::RgbaImage;
use rxing::{BarcodeFormat, Exceptions};
use tracing::debug;

use super::{DecodeError, DecodeProvider, DetectedSymbol};

/// Detection backed by `rxing`, covering QR and the common 1D and 2D
/// symbologies.
#[derive(Debug, Clone, Default)]
pub struct MultiFormatProvider;

impl MultiFormatProvider {
    pub fn new() -> Self {
        Self
    }
}

impl DecodeProvider for MultiFormatProvider {
    fn detect(&self, image: &RgbaImage) -> Result<Vec<DetectedSymbol>, DecodeError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::EmptyImage { width, height });
        }

        let luma = image::imageops::grayscale(image).into_raw();
        let results = match rxing::helpers::detect_multiple_in_luma(luma, width, height) {
            Ok(results) => results,
            Err(Exceptions::NotFoundException(_)) => Vec::new(),
            Err(err) => return Err(DecodeError::Provider(err.to_string())),
        };
        debug!(symbols = results.len(), "rxing finished");

        Ok(results
            .iter()
            .map(|result| {
                DetectedSymbol::new(
                    symbology_id(result.getBarcodeFormat()),
                    result.getText().as_bytes(),
                )
            })
            .collect())
    }
}

/// Raw identifier for an rxing format, spelled the way the label table
/// expects. Formats outside the table keep their rxing name.
pub fn symbology_id(format: &BarcodeFormat) -> String {
    let id = match format {
        BarcodeFormat::AZTEC => "AZTEC",
        BarcodeFormat::CODE_128 => "CODE128",
        BarcodeFormat::CODE_39 => "CODE39",
        BarcodeFormat::CODE_93 => "CODE93",
        BarcodeFormat::DATA_MATRIX => "DATA MATRIX",
        BarcodeFormat::EAN_13 => "EAN13",
        BarcodeFormat::EAN_8 => "EAN8",
        BarcodeFormat::ITF => "ITF",
        BarcodeFormat::PDF_417 => "PDF417",
        BarcodeFormat::QR_CODE => "QRCODE",
        BarcodeFormat::UPC_A => "UPC-A",
        BarcodeFormat::UPC_E => "UPC-E",
        other => return format!("{other:?}"),
    };
    id.to_string()
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};
    use rxing::{MultiFormatWriter, Writer};

    use super::*;
    use crate::decoder::symbology_label;

    const QUIET_ZONE: u32 = 20;

    fn render(format: BarcodeFormat, contents: &str, width: i32, height: i32) -> RgbaImage {
        let matrix = MultiFormatWriter::default()
            .encode(contents, &format, width, height)
            .expect("encode barcode");
        let mut image = RgbaImage::from_pixel(
            matrix.width() + QUIET_ZONE * 2,
            matrix.height() + QUIET_ZONE * 2,
            Rgba([255, 255, 255, 255]),
        );
        for y in 0..matrix.height() {
            for x in 0..matrix.width() {
                if matrix.get(x, y) {
                    image.put_pixel(x + QUIET_ZONE, y + QUIET_ZONE, Rgba([0, 0, 0, 255]));
                }
            }
        }
        image
    }

    #[test]
    fn decodes_code128_barcode() {
        let image = render(BarcodeFormat::CODE_128, "ABC-123", 300, 80);
        let symbols = MultiFormatProvider::new().detect(&image).expect("detect");

        assert_eq!(symbols, vec![DetectedSymbol::new("CODE128", "ABC-123")]);
        assert_eq!(symbology_label(&symbols[0].symbology), "Code 128条形码");
    }

    #[test]
    fn decodes_ean13_barcode() {
        let image = render(BarcodeFormat::EAN_13, "4006381333931", 300, 80);
        let symbols = MultiFormatProvider::new().detect(&image).expect("detect");

        assert_eq!(symbols, vec![DetectedSymbol::new("EAN13", "4006381333931")]);
    }

    #[test]
    fn decodes_qr_code() {
        let image = render(BarcodeFormat::QR_CODE, "https://example.com", 200, 200);
        let symbols = MultiFormatProvider::new().detect(&image).expect("detect");

        assert_eq!(symbols, vec![DetectedSymbol::new("QRCODE", "https://example.com")]);
    }

    #[test]
    fn blank_image_has_no_symbols() {
        let image = RgbaImage::from_pixel(64, 64, Rgba([255, 255, 255, 255]));
        let symbols = MultiFormatProvider::new().detect(&image).expect("detect");
        assert!(symbols.is_empty());
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        let image = RgbaImage::new(0, 0);
        let err = MultiFormatProvider::new().detect(&image).expect_err("empty image");
        assert!(matches!(err, DecodeError::EmptyImage { .. }));
    }

    #[test]
    fn every_table_format_maps_to_a_label() {
        for format in [
            BarcodeFormat::AZTEC,
            BarcodeFormat::CODE_128,
            BarcodeFormat::CODE_39,
            BarcodeFormat::CODE_93,
            BarcodeFormat::DATA_MATRIX,
            BarcodeFormat::EAN_13,
            BarcodeFormat::EAN_8,
            BarcodeFormat::ITF,
            BarcodeFormat::PDF_417,
            BarcodeFormat::QR_CODE,
            BarcodeFormat::UPC_A,
            BarcodeFormat::UPC_E,
        ] {
            let id = symbology_id(&format);
            assert_ne!(symbology_label(&id), id, "{format:?} has no label");
        }
    }
}
