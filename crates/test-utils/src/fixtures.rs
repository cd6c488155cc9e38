//! Common test fixtures for imagery and report tests.

/// Namespace of the imagery service's REST responses.
pub const BING_NAMESPACE: &str = "http://schemas.microsoft.com/search/local/ws/rest/v1";

/// Bounds the stub imagery service reports for the sample field:
/// west, north, east, south in document order.
pub const FIELD_BOUNDS: [(&str, &str); 4] = [
    ("WestLongitude", "-93.10"),
    ("NorthLatitude", "42.98"),
    ("EastLongitude", "-93.08"),
    ("SouthLatitude", "42.95"),
];

/// Raw extent of the sample field as `(west, south, east, north)`.
pub const FIELD_RAW_EXTENT: (f64, f64, f64, f64) = (-93.09, 42.96, -93.075, 42.97);

/// Bytes served in place of a real aerial image. Only the signature is real;
/// nothing in the pipeline decodes the image.
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDRstub-image-body";

/// Builds a static-map metadata document with the given bound children.
///
/// Children appear in the order given, under
/// `Response/ResourceSets/ResourceSet/Resources/StaticMapMetadata/BoundingBox`,
/// followed by the image size elements the service also returns.
pub fn bing_metadata_xml(bounds: &[(&str, &str)]) -> String {
    let children: String = bounds
        .iter()
        .map(|(tag, value)| format!("            <{tag}>{value}</{tag}>\n"))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<Response xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns="{ns}">
  <Copyright>Copyright © 2014 Microsoft and its suppliers.</Copyright>
  <StatusCode>200</StatusCode>
  <StatusDescription>OK</StatusDescription>
  <AuthenticationResultCode>ValidCredentials</AuthenticationResultCode>
  <ResourceSets>
    <ResourceSet>
      <EstimatedTotal>1</EstimatedTotal>
      <Resources>
        <StaticMapMetadata>
          <BoundingBox>
{children}          </BoundingBox>
          <ImageHeight>830</ImageHeight>
          <ImageWidth>830</ImageWidth>
          <MapCenter>
            <Latitude>42.965</Latitude>
            <Longitude>-93.09</Longitude>
          </MapCenter>
          <Zoom>15</Zoom>
        </StaticMapMetadata>
      </Resources>
    </ResourceSet>
  </ResourceSets>
</Response>
"#,
        ns = BING_NAMESPACE,
        children = children
    )
}

/// The metadata document for [`FIELD_BOUNDS`].
pub fn field_metadata_xml() -> String {
    bing_metadata_xml(&FIELD_BOUNDS)
}
