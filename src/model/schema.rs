diesel::table! {
    persona (email) {
        email -> Varchar,
        nombre -> Varchar,
        apellido -> Varchar,
        contrasenia -> Varchar,
        rol -> Varchar,
    }
}

diesel::table! {
    host (id) {
        id -> Integer,
        nombre -> Varchar,
        mac -> Varchar,
        ip -> Varchar,
        hostname -> Varchar,
        ram_total -> Integer,
        cpu_total -> Integer,
        almacenamiento_total -> Integer,
        ram_usada -> Integer,
        cpu_usada -> Integer,
        almacenamiento_usado -> Integer,
        adaptador_red -> Varchar,
        estado -> Varchar,
        ruta_llave_ssh_pub -> Varchar,
        sistema_operativo -> Varchar,
        distribucion_sistema_operativo -> Varchar,
    }
}

diesel::table! {
    disco (id) {
        id -> Integer,
        nombre -> Varchar,
        ruta_ubicacion -> Varchar,
        sistema_operativo -> Varchar,
        distribucion_sistema_operativo -> Varchar,
        arquitectura -> Integer,
        host_id -> Integer,
    }
}

diesel::table! {
    maquina_virtual (nombre) {
        uuid -> Varchar,
        nombre -> Varchar,
        ram -> Integer,
        cpu -> Integer,
        ip -> Varchar,
        estado -> Varchar,
        hostname -> Varchar,
        persona_email -> Varchar,
        host_id -> Integer,
        disco_id -> Integer,
        fecha_creacion -> Datetime,
    }
}

diesel::table! {
    catalogo (id) {
        id -> Integer,
        nombre -> Varchar,
        ram -> Integer,
        cpu -> Integer,
    }
}

diesel::table! {
    catalogo_disco (catalogo_id, disco_id) {
        catalogo_id -> Integer,
        disco_id -> Integer,
    }
}

diesel::joinable!(disco -> host (host_id));
diesel::joinable!(maquina_virtual -> disco (disco_id));
diesel::joinable!(maquina_virtual -> host (host_id));
diesel::joinable!(maquina_virtual -> persona (persona_email));
diesel::joinable!(catalogo_disco -> catalogo (catalogo_id));
diesel::joinable!(catalogo_disco -> disco (disco_id));

diesel::allow_tables_to_appear_in_same_query!(
    persona,
    host,
    disco,
    maquina_virtual,
    catalogo,
    catalogo_disco,
);
