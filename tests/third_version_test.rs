//! 2.6.0 to 3.0.0 conversion of complete documents.

use asyncapi_converter::{convert, ConvertError, ConvertOptions, Input, PointOfView};
use serde_json::{json, Value};

const STREETLIGHTS: &str = r#"
asyncapi: 2.6.0
id: urn:com:smartylighting:streetlights:server
info:
  title: Streetlights Kafka API
  version: 1.0.0
  description: The Smartylighting Streetlights API.
tags:
  - name: lights
servers:
  scram-connections:
    url: test.mykafkacluster.org:18092
    protocol: kafka-secure
    description: Test broker secured with scramSha256
    security:
      - saslScram: []
defaultContentType: application/json
channels:
  smartylighting.streetlights.1.0.event.{streetlightId}.lighting.measured:
    description: The topic on which measured values may be produced and consumed.
    parameters:
      streetlightId:
        $ref: '#/components/parameters/streetlightId'
    subscribe:
      summary: Receive information about environmental lighting conditions of a particular streetlight.
      operationId: receiveLightMeasurement
      traits:
        - $ref: '#/components/operationTraits/kafka'
      message:
        $ref: '#/components/messages/lightMeasured'
  smartylighting.streetlights.1.0.action.{streetlightId}.turn.on:
    parameters:
      streetlightId:
        $ref: '#/components/parameters/streetlightId'
    publish:
      operationId: turnOn
      message:
        $ref: '#/components/messages/turnOnOff'
components:
  messages:
    lightMeasured:
      messageId: lightMeasured
      name: lightMeasured
      title: Light measured
      contentType: application/json
      payload:
        $ref: '#/components/schemas/lightMeasuredPayload'
    turnOnOff:
      messageId: turnOnOff
      name: turnOnOff
      payload:
        $ref: '#/components/schemas/turnOnOffPayload'
  schemas:
    lightMeasuredPayload:
      type: object
      properties:
        lumens:
          type: integer
          minimum: 0
    turnOnOffPayload:
      type: object
      properties:
        command:
          type: string
          enum: ['on', 'off']
  securitySchemes:
    saslScram:
      type: scramSha256
  parameters:
    streetlightId:
      description: The ID of the streetlight.
      schema:
        type: string
  operationTraits:
    kafka:
      operationId: kafkaTrait
      bindings:
        kafka:
          clientId:
            type: string
"#;

fn convert_text(text: &str, options: &ConvertOptions) -> Result<Value, ConvertError> {
    convert(Input::Text(text), "3.0.0", options)?.to_value()
}

#[test]
fn test_streetlights_document() {
    let converted = convert_text(STREETLIGHTS, &ConvertOptions::default()).unwrap();

    assert_eq!(converted["asyncapi"], "3.0.0");
    assert_eq!(converted["info"]["tags"], json!([{"name": "lights"}]));
    assert!(converted.get("tags").is_none());
    assert_eq!(converted["defaultContentType"], "application/json");

    assert_eq!(
        converted["servers"]["scram-connections"],
        json!({
            "host": "test.mykafkacluster.org:18092",
            "protocol": "kafka-secure",
            "description": "Test broker secured with scramSha256",
            "security": [{"$ref": "#/components/securitySchemes/saslScram"}]
        })
    );

    let measured = &converted["channels"]["smartylightingStreetlights10EventStreetlightIdLightingMeasured"];
    assert_eq!(
        measured["address"],
        "smartylighting.streetlights.1.0.event.{streetlightId}.lighting.measured"
    );
    assert_eq!(
        measured["parameters"]["streetlightId"],
        json!({"$ref": "#/components/parameters/streetlightId"})
    );
    assert_eq!(
        measured["messages"]["lightMeasured"],
        json!({"$ref": "#/components/messages/lightMeasured"})
    );

    let receive = &converted["operations"]["receiveLightMeasurement"];
    assert_eq!(receive["action"], "send");
    assert_eq!(
        receive["channel"],
        json!({"$ref": "#/channels/smartylightingStreetlights10EventStreetlightIdLightingMeasured"})
    );
    assert_eq!(
        receive["messages"],
        json!([{
            "$ref": "#/channels/smartylightingStreetlights10EventStreetlightIdLightingMeasured/messages/lightMeasured"
        }])
    );
    assert_eq!(converted["operations"]["turnOn"]["action"], "receive");

    assert_eq!(
        converted["components"]["parameters"]["streetlightId"],
        json!({"description": "The ID of the streetlight."})
    );
    assert!(converted["components"]["messages"]["lightMeasured"]
        .get("messageId")
        .is_none());
    assert!(converted["components"]["operationTraits"]["kafka"]
        .get("operationId")
        .is_none());
}

#[test]
fn test_client_point_of_view() {
    let options = ConvertOptions::default().with_point_of_view(PointOfView::Client);
    let converted = convert_text(STREETLIGHTS, &options).unwrap();
    assert_eq!(converted["operations"]["receiveLightMeasurement"]["action"], "receive");
    assert_eq!(converted["operations"]["turnOn"]["action"], "send");
}

#[test]
fn test_references_into_component_channels_are_rewritten() {
    let converted = convert_text(
        r#"
asyncapi: 2.6.0
info: {title: Signup, version: 1.0.0}
channels:
  users/signup:
    $ref: '#/components/channels/usersSignup'
components:
  channels:
    usersSignup:
      publish:
        operationId: signup
        message:
          $ref: '#/components/messages/signup'
  messages:
    signup:
      payload: {type: object}
    audit:
      payload:
        $ref: '#/components/channels/usersSignup/publish/message'
"#,
        &ConvertOptions::default(),
    )
    .unwrap();

    assert_eq!(
        converted["components"]["messages"]["audit"]["payload"],
        json!({"$ref": "#/components/channels/usersSignup/messages/signup.message"})
    );
    assert_eq!(
        converted["components"]["operations"]["signup"]["messages"],
        json!([{"$ref": "#/components/channels/usersSignup/messages/signup.message"}])
    );
    assert_eq!(
        converted["operations"]["signup"],
        json!({"$ref": "#/components/operations/signup"})
    );
}

#[test]
fn test_references_into_operations_are_rewritten() {
    let converted = convert_text(
        r#"
asyncapi: 2.6.0
info: {title: Lights, version: 1.0.0}
channels:
  lights:
    publish:
      operationId: measure
      message:
        payload: {type: object}
  dimmed:
    subscribe:
      message:
        $ref: '#/channels/lights/publish/message'
      bindings:
        $ref: '#/channels/lights/publish/bindings'
"#,
        &ConvertOptions::default(),
    )
    .unwrap();

    assert_eq!(
        converted["channels"]["dimmed"]["messages"]["dimmed.subscribe.message"],
        json!({"$ref": "#/channels/lights/messages/measure.message"})
    );
    assert_eq!(
        converted["operations"]["dimmed.subscribe"]["bindings"],
        json!({"$ref": "#/operations/measure/bindings"})
    );
}

#[test]
fn test_referenced_parameter_schema_can_fail() {
    let document = r#"
asyncapi: 2.6.0
info: {title: Lights, version: 1.0.0}
channels:
  lights/{id}:
    parameters:
      id:
        schema:
          $ref: '#/components/schemas/id'
"#;
    let mut options = ConvertOptions::default();
    assert!(convert_text(document, &options).is_ok());

    options.v2tov3.fail_on_parameter_reference = true;
    let err = convert_text(document, &options).unwrap_err();
    assert!(matches!(err, ConvertError::UnsupportedParameter { ref name, .. } if name == "id"));
}

#[test]
fn test_three_one_only_restamps() {
    let converted = convert(
        Input::Text(r#"{"asyncapi": "3.0.0", "info": {"title": "x", "version": "1"}}"#),
        "3.1.0",
        &ConvertOptions::default(),
    )
    .unwrap()
    .to_value()
    .unwrap();
    assert_eq!(
        converted,
        json!({"asyncapi": "3.1.0", "info": {"title": "x", "version": "1"}})
    );
}

#[test]
fn test_component_operation_ids_do_not_collide_with_root_ones() {
    let converted = convert_text(
        r#"
asyncapi: 2.6.0
info: {title: Signup, version: 1.0.0}
channels:
  a:
    publish:
      operationId: signup
      message:
        payload: {type: object}
  b:
    $ref: '#/components/channels/c'
components:
  channels:
    c:
      subscribe:
        operationId: signup
        message:
          payload: {type: string}
"#,
        &ConvertOptions::default(),
    )
    .unwrap();

    assert_eq!(
        converted["operations"]["signup"]["channel"],
        json!({"$ref": "#/channels/a"})
    );
    assert_eq!(
        converted["operations"]["signup_1"],
        json!({"$ref": "#/components/operations/signup_1"})
    );
    assert!(converted["components"]["operations"].get("signup_1").is_some());
}
