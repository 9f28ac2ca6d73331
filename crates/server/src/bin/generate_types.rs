use server::response::{BulkDeleteBody, ErrorBody, HealthBody, MessageBody};
use services::services::{
    schema::{FieldSpec, FieldType, SchemaDefinition},
    validator::{FieldError, FieldErrorReason},
};
use ts_rs::TS;

fn main() {
    let declarations = [
        FieldType::decl(),
        FieldSpec::decl(),
        SchemaDefinition::decl(),
        FieldErrorReason::decl(),
        FieldError::decl(),
        ErrorBody::decl(),
        MessageBody::decl(),
        BulkDeleteBody::decl(),
        HealthBody::decl(),
    ];

    println!("// This file was generated by `generate-types`. Do not edit.\n");
    for declaration in declarations {
        println!("export {declaration}\n");
    }
}
