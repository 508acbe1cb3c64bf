use std::collections::HashMap;
use std::io::{Cursor, Write};

use kml::types::{Element, Geometry as KmlGeometry, Placemark, Point as KmlPoint};
use kml::{Kml, KmlDocument, KmlVersion, KmlWriter};
use zip::write::FileOptions;
use zip::CompressionMethod;

use crate::error::{GeopinError, Result};
use crate::models::point::value_to_text;
use crate::models::Point;

const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";

fn element(
    name: &str,
    attrs: HashMap<String, String>,
    content: Option<String>,
    children: Vec<Element>,
) -> Element {
    Element {
        name: name.to_string(),
        attrs,
        content,
        children,
    }
}

/// `<ExtendedData>` holding every exportable attribute as `<Data>`
fn extended_data(point: &Point) -> Element {
    let data = point
        .exportable_attributes()
        .map(|(key, value)| {
            let attrs = HashMap::from([("name".to_string(), key.clone())]);
            let value = element("value", HashMap::new(), Some(value_to_text(value)), vec![]);
            element("Data", attrs, None, vec![value])
        })
        .collect();
    element("ExtendedData", HashMap::new(), None, data)
}

fn placemark(point: &Point) -> Kml<f64> {
    Kml::Placemark(Placemark {
        name: point.attribute_text("name"),
        geometry: Some(KmlGeometry::Point(KmlPoint::new(point.lng, point.lat, None))),
        children: vec![extended_data(point)],
        ..Default::default()
    })
}

/// KML document with one Placemark per point
pub fn to_kml(points: &[Point]) -> Result<Vec<u8>> {
    let document = Kml::Document {
        attrs: HashMap::new(),
        elements: points.iter().map(placemark).collect(),
    };
    let root = Kml::KmlDocument(KmlDocument {
        version: KmlVersion::V22,
        attrs: HashMap::from([("xmlns".to_string(), KML_NAMESPACE.to_string())]),
        elements: vec![document],
    });

    let mut buf = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n".to_vec();
    {
        let mut writer = KmlWriter::<_, f64>::from_writer(&mut buf);
        writer.write(&root).map_err(GeopinError::export)?;
    }
    Ok(buf)
}

/// Zipped KML, stored as `doc.kml`
pub fn to_kmz(points: &[Point]) -> Result<Vec<u8>> {
    let kml = to_kml(points)?;

    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options: FileOptions<'_, ()> =
            FileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file("doc.kml", options)
            .map_err(GeopinError::export)?;
        zip.write_all(&kml)?;
        zip.finish().map_err(GeopinError::export)?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Read;

    fn sample() -> Vec<Point> {
        vec![Point::new(
            48.8566,
            2.3522,
            json!({"name": "Paris", "_lat": 48.8566, "country": "France"})
                .as_object()
                .cloned()
                .unwrap(),
        )]
    }

    #[test]
    fn test_kml_placemarks() {
        let text = String::from_utf8(to_kml(&sample()).unwrap()).unwrap();
        assert!(text.contains("<Placemark"));
        assert!(text.contains("Paris"));
        assert!(text.contains("2.3522,48.8566"));
        assert!(text.contains("France"));
        assert!(!text.contains("_lat"));
    }

    #[test]
    fn test_kmz_holds_doc_kml() {
        let kmz = to_kmz(&sample()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(kmz)).unwrap();
        let mut doc = archive.by_name("doc.kml").unwrap();
        let mut text = String::new();
        doc.read_to_string(&mut text).unwrap();
        assert!(text.contains("<Placemark"));
    }
}
